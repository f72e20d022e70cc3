//! Storage layer - the backend boundary and its SQLite implementation
//!
//! The engine talks to storage through [`StorageBackend`]: structural sync
//! of one entity, row counting, and single-row inserts. The bundled
//! implementation is SQLite; anything that can satisfy the trait can sit
//! behind the engine.

pub mod ddl;
pub mod sqlite;

pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use serde_json::Map;
use std::fmt;

use crate::Result;
use crate::entity::Entity;
use crate::registry::Registry;

/// Attribute name -> value mapping for one row
pub type RowValues = Map<String, serde_json::Value>;

/// What a structural sync did to the entity's storage shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Table did not exist and was created
    Created,
    /// Table was dropped and created again (force)
    Recreated,
    /// Table already existed; nothing to do
    Unchanged,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Recreated => "recreated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capability set the sync engine requires from a storage backend.
///
/// All operations are suspension points of the single cooperative task
/// stream; the engine never issues two backend calls concurrently, so
/// implementations need no internal locking.
#[async_trait]
pub trait StorageBackend: Send {
    /// Idempotent create-or-update of the entity's storage shape.
    /// `force` instructs destructive recreation. The registry rides along
    /// so the backend can resolve reference targets to their tables.
    async fn structural_sync(
        &mut self,
        entity: &Entity,
        registry: &Registry,
        force: bool,
    ) -> Result<SyncOutcome>;

    /// Current number of persisted rows for the entity
    async fn row_count(&mut self, entity: &Entity) -> Result<u64>;

    /// Insert a single row; values are keyed by attribute name
    async fn insert_row(&mut self, entity: &Entity, values: &RowValues) -> Result<()>;
}
