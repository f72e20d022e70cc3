//! SQLite storage backend

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use std::path::Path;

use super::ddl;
use super::{RowValues, StorageBackend, SyncOutcome};
use crate::Result;
use crate::entity::Entity;
use crate::registry::Registry;

/// SQLite-backed storage for entity tables
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Map a fixture value to a SQLite parameter; structured values are
    /// stored as serialized JSON text
    fn bind_value(value: &serde_json::Value) -> SqlValue {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Integer(i)
                } else {
                    SqlValue::Real(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn structural_sync(
        &mut self,
        entity: &Entity,
        registry: &Registry,
        force: bool,
    ) -> Result<SyncOutcome> {
        let existed = self.table_exists(&entity.table_name())?;

        if force && existed {
            self.conn.execute(&ddl::drop_table(entity), [])?;
        }

        for statement in ddl::sync_statements(entity, registry) {
            self.conn.execute(&statement, [])?;
        }

        Ok(match (existed, force) {
            (true, true) => SyncOutcome::Recreated,
            (true, false) => SyncOutcome::Unchanged,
            (false, _) => SyncOutcome::Created,
        })
    }

    async fn row_count(&mut self, entity: &Entity) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", entity.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn insert_row(&mut self, entity: &Entity, values: &RowValues) -> Result<()> {
        // Columns follow the entity's attribute order, taking only the
        // values actually present in the row
        let mut columns: Vec<&str> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        for attribute in &entity.attributes {
            if let Some(value) = values.get(&attribute.name) {
                columns.push(attribute.name.as_str());
                params.push(Self::bind_value(value));
            }
        }

        if columns.is_empty() {
            self.conn.execute(
                &format!("INSERT INTO {} DEFAULT VALUES", entity.table_name()),
                [],
            )?;
            return Ok(());
        }

        self.conn.execute(
            &ddl::insert_row(entity, &columns),
            rusqlite::params_from_iter(params),
        )?;
        Ok(())
    }
}
