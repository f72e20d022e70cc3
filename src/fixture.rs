//! Fixture sources - seed data discovery and reading
//!
//! A fixture is a JSON file holding an ordered array of row objects for
//! one entity. Discovery matches `<entity-name>.json` files in a fixtures
//! directory against the registry and attaches the path as registry
//! metadata; the engine consumes them once per run.

use std::fs;
use std::path::Path;

use crate::registry::Registry;
use crate::storage::RowValues;
use crate::{Error, Result};

/// Scan `dir` for fixture files matching registered entities.
///
/// Returns the names of entities that received a fixture path, in
/// registration order. A missing directory is not an error; there is
/// simply nothing to seed.
pub fn discover(dir: &Path, registry: &mut Registry) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut matched = Vec::new();
    for name in registry.names().to_vec() {
        let path = dir.join(format!("{name}.json"));
        if path.is_file() {
            registry.set_fixture_path(&name, path);
            matched.push(name);
        }
    }
    Ok(matched)
}

/// Read a fixture file into its ordered row sequence.
///
/// The file must contain a JSON array of objects; anything else is a
/// [`Error::FixtureRead`], which the engine isolates to this fixture.
pub fn read_rows(path: &Path) -> Result<Vec<RowValues>> {
    let contents = fs::read_to_string(path).map_err(|e| Error::FixtureRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let value: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| Error::FixtureRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let serde_json::Value::Array(items) = value else {
        return Err(Error::FixtureRead {
            path: path.display().to_string(),
            reason: "expected a JSON array of row objects".to_string(),
        });
    };

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            serde_json::Value::Object(map) => rows.push(map),
            other => {
                return Err(Error::FixtureRead {
                    path: path.display().to_string(),
                    reason: format!("row {index} is not an object: {other}"),
                });
            }
        }
    }
    Ok(rows)
}

/// Summary of one `load_fixtures` run
#[derive(Debug, Clone, Default)]
pub struct FixtureReport {
    /// Entities seeded in this run
    pub seeded: usize,
    /// Entities skipped because their table already held rows
    pub skipped: usize,
    /// Fixtures that failed (unreadable file or a row insert)
    pub failed: usize,
    /// Total rows inserted across all fixtures
    pub rows_inserted: u64,
}

impl std::fmt::Display for FixtureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} seeded, {} skipped, {} failed, {} rows",
            self.seeded, self.skipped, self.failed, self.rows_inserted
        )
    }
}
