//! # Modelsync - dependency-ordered schema synchronization and seeding
//!
//! Entities declare foreign-key-like references to one another; modelsync
//! materializes them in a safe order.
//!
//! Modelsync provides:
//! - An entity registry as the single source of truth for definitions
//! - On-demand reference resolution (entity name or table identifier)
//! - A cycle-tolerant topological processing order
//! - A recursive synchronization engine with at-most-once execution
//! - JSON fixture seeding with progress reporting and per-fixture isolation
//! - A SQLite storage backend behind an async boundary trait

pub mod entity;
pub mod registry;
pub mod resolver;
pub mod order;
pub mod engine;
pub mod fixture;
pub mod extension;
pub mod storage;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use entity::{Attribute, AttributeType, Entity};
pub use engine::{SyncEngine, SyncReport};
pub use extension::{Extensions, ModelExtension};
pub use fixture::FixtureReport;
pub use registry::Registry;
pub use storage::{SqliteBackend, StorageBackend, SyncOutcome};

/// Result type alias for modelsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for modelsync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed entity or attribute definitions; surfaced before any
    /// sync begins
    #[error("Invalid model definition: {0}")]
    Configuration(String),

    /// The storage backend rejected a create/alter; aborts the batch
    #[error("Structural sync of '{entity}' failed: {source}")]
    StructuralSync {
        entity: String,
        source: Box<Error>,
    },

    /// Seed file unreadable or malformed; isolated to that fixture
    #[error("Fixture {path} unreadable: {reason}")]
    FixtureRead { path: String, reason: String },

    /// A single row failed; aborts the remaining rows of that fixture
    #[error("Row {index} of '{entity}' failed to insert: {source}")]
    RowInsert {
        entity: String,
        index: usize,
        source: Box<Error>,
    },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
