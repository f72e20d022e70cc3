//! Synchronization engine - recursive dependency-ordered sync and seeding
//!
//! The engine drives two structurally identical traversals over the
//! entity set: structural synchronization (create storage shape if
//! needed) and fixture population (seed empty tables). Both run each
//! entity at most once per run. Referenced entities are materialized
//! lazily and recursively before the referencing entity, with an explicit
//! in-progress marker so reference cycles terminate instead of recursing
//! forever.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::entity::Entity;
use crate::extension::Extensions;
use crate::fixture::{self, FixtureReport};
use crate::order;
use crate::registry::Registry;
use crate::resolver;
use crate::storage::{RowValues, StorageBackend, SyncOutcome};
use crate::{Error, Result};

/// Progress sink: invoked with (entity name, percent complete) on each
/// new percentage boundary during fixture population
pub type ProgressFn = Box<dyn FnMut(&str, u8) + Send>;

/// Handler for fixture fields that match no attribute. May remap the
/// field to a (column, value) pair, or drop it by returning `None`.
pub type FieldOverrideFn =
    Box<dyn FnMut(&Entity, &str, &serde_json::Value) -> Option<(String, serde_json::Value)> + Send>;

/// Summary of one `sync_all` run
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncReport {
    pub created: usize,
    pub recreated: usize,
    pub unchanged: usize,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.created + self.recreated + self.unchanged
    }

    fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Recreated => self.recreated += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} recreated, {} unchanged",
            self.created, self.recreated, self.unchanged
        )
    }
}

/// Dependency-ordered model synchronization and population engine
pub struct SyncEngine {
    registry: Registry,
    backend: Box<dyn StorageBackend>,
    extensions: Extensions,
    /// Entities whose structural sync completed successfully this run
    completed: HashSet<String>,
    /// Entities currently being synchronized; breaks reference cycles
    in_progress: HashSet<String>,
    progress: Option<ProgressFn>,
    field_override: Option<FieldOverrideFn>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("completed", &self.completed)
            .field("in_progress", &self.in_progress)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Build an engine over an already-populated registry.
    ///
    /// Every entity is validated up front; a malformed definition
    /// surfaces here, before any sync begins.
    pub fn new(registry: Registry, backend: Box<dyn StorageBackend>) -> Result<Self> {
        Self::with_extensions(registry, backend, Extensions::new())
    }

    /// Build an engine from fully formed entity definitions
    pub fn initialize(
        entities: Vec<Entity>,
        backend: Box<dyn StorageBackend>,
    ) -> Result<Self> {
        Self::new(Registry::from_entities(entities), backend)
    }

    /// Build an engine with registered extensions. Provided attributes
    /// are merged before validation.
    pub fn with_extensions(
        mut registry: Registry,
        backend: Box<dyn StorageBackend>,
        extensions: Extensions,
    ) -> Result<Self> {
        extensions.apply_attributes(&mut registry);
        for entity in registry.all() {
            entity.validate()?;
        }

        Ok(Self {
            registry,
            backend,
            extensions,
            completed: HashSet::new(),
            in_progress: HashSet::new(),
            progress: None,
            field_override: None,
        })
    }

    /// Install the fixture progress sink
    pub fn set_progress(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }

    /// Install the unknown-field handler for fixture rows
    pub fn set_field_override(&mut self, handler: FieldOverrideFn) {
        self.field_override = Some(handler);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Whether an entity's structural sync completed this run
    pub fn is_synced(&self, name: &str) -> bool {
        self.completed.contains(name)
    }

    /// The entities `name` directly references
    pub fn references_of(&self, name: &str) -> Result<Vec<String>> {
        let entity = self
            .registry
            .get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))?;
        Ok(resolver::references_of(entity, &self.registry))
    }

    /// Synchronize one entity, materializing its references first.
    ///
    /// Idempotent within a run: an entity already in the ledger is a
    /// no-op success with zero backend calls.
    pub async fn sync(&mut self, name: &str, force: bool) -> Result<()> {
        self.sync_entity(name, force).await?;
        Ok(())
    }

    /// Synchronize every registered entity in dependency order.
    ///
    /// The explicit order is a readability aid; correctness comes from
    /// the recursive walk inside `sync` itself. The first structural
    /// failure aborts the batch.
    pub async fn sync_all(&mut self, force: bool) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for name in order::sync_order(&self.registry) {
            if let Some(outcome) = self.sync_entity(&name, force).await? {
                report.record(outcome);
            }
        }
        tracing::info!("synchronized {} entities: {}", report.total(), report);
        Ok(report)
    }

    /// Returns the structural-sync outcome when this call performed one,
    /// or `None` on a ledger / in-progress skip.
    fn sync_entity<'a>(
        &'a mut self,
        name: &'a str,
        force: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SyncOutcome>>> + Send + 'a>> {
        Box::pin(async move {
            if self.completed.contains(name) || self.in_progress.contains(name) {
                return Ok(None);
            }

            let entity = self
                .registry
                .get(name)
                .ok_or_else(|| Error::UnknownEntity(name.to_string()))?
                .clone();

            // The marker comes off on both paths; only success reaches
            // the completed ledger
            self.in_progress.insert(name.to_string());
            let result = self.sync_with_dependencies(&entity, force).await;
            self.in_progress.remove(name);

            let outcome = result?;
            self.completed.insert(name.to_string());
            tracing::debug!("entity '{name}' synchronized ({outcome})");
            Ok(Some(outcome))
        })
    }

    async fn sync_with_dependencies(
        &mut self,
        entity: &Entity,
        force: bool,
    ) -> Result<SyncOutcome> {
        for reference in resolver::references_of(entity, &self.registry) {
            self.sync_entity(&reference, force).await?;
        }

        self.backend
            .structural_sync(entity, &self.registry, force)
            .await
            .map_err(|source| Error::StructuralSync {
                entity: entity.name.clone(),
                source: Box::new(source),
            })
    }

    /// Seed every entity with an attached fixture, in sync order.
    ///
    /// Fixtures only seed empty tables. A bad fixture file or a failed
    /// row insert is logged and isolated to that fixture; the batch
    /// continues with the next record.
    pub async fn load_fixtures(&mut self) -> Result<FixtureReport> {
        let mut report = FixtureReport::default();

        for name in order::sync_order(&self.registry) {
            let Some(path) = self.registry.fixture_path(&name).map(Path::to_path_buf) else {
                continue;
            };
            let entity = self
                .registry
                .get(&name)
                .ok_or_else(|| Error::UnknownEntity(name.clone()))?
                .clone();

            let count = self.backend.row_count(&entity).await?;
            if count > 0 {
                tracing::debug!("skipping fixture for '{name}': {count} rows present");
                report.skipped += 1;
                continue;
            }

            let rows = match fixture::read_rows(&path) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!("unreadable fixture for '{name}': {e}");
                    report.failed += 1;
                    continue;
                }
            };

            match self.populate_rows(&entity, rows).await {
                Ok(inserted) => {
                    tracing::info!("seeded '{name}' with {inserted} rows");
                    report.seeded += 1;
                    report.rows_inserted += inserted;
                }
                Err(e) => {
                    tracing::error!("fixture for '{name}' aborted: {e}");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Insert rows for one entity, strictly one at a time in order,
    /// reporting integer percentage progress on each new boundary.
    pub async fn populate_data(&mut self, name: &str, rows: Vec<RowValues>) -> Result<u64> {
        let entity = self
            .registry
            .get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))?
            .clone();
        self.populate_rows(&entity, rows).await
    }

    async fn populate_rows(&mut self, entity: &Entity, rows: Vec<RowValues>) -> Result<u64> {
        let total = rows.len();
        let mut last_percent = 0u8;
        let mut inserted = 0u64;

        for (index, row) in rows.into_iter().enumerate() {
            let row = self.prepare_row(entity, row);
            self.backend
                .insert_row(entity, &row)
                .await
                .map_err(|source| Error::RowInsert {
                    entity: entity.name.clone(),
                    index,
                    source: Box::new(source),
                })?;
            inserted += 1;

            let percent = (((index + 1) * 100) / total) as u8;
            if percent > last_percent {
                last_percent = percent;
                if let Some(progress) = self.progress.as_mut() {
                    progress(&entity.name, percent);
                }
            }
        }

        Ok(inserted)
    }

    /// Keep known attributes, route unknown fields through the override
    /// handler (or drop them), then apply row decorators in order
    fn prepare_row(&mut self, entity: &Entity, row: RowValues) -> RowValues {
        let mut prepared = RowValues::new();
        for (key, value) in row {
            if entity.attribute(&key).is_some() {
                prepared.insert(key, value);
            } else if let Some(handler) = self.field_override.as_mut() {
                if let Some((column, mapped)) = handler(entity, &key, &value) {
                    prepared.insert(column, mapped);
                }
            } else {
                tracing::debug!(
                    "ignoring unknown field '{key}' in fixture row for '{}'",
                    entity.name
                );
            }
        }
        self.extensions.decorate_row(entity, prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Attribute, AttributeType};
    use crate::extension::ModelExtension;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Backend that records calls and can be told to fail
    #[derive(Default)]
    struct RecordingBackend {
        calls: Arc<Mutex<Vec<String>>>,
        counts: HashMap<String, u64>,
        fail_sync: Arc<Mutex<HashSet<String>>>,
        fail_insert_at: Option<(String, usize)>,
        inserts_seen: usize,
    }

    impl RecordingBackend {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let backend = Self::default();
            let calls = backend.calls.clone();
            (backend, calls)
        }
    }

    #[async_trait]
    impl StorageBackend for RecordingBackend {
        async fn structural_sync(
            &mut self,
            entity: &Entity,
            _registry: &Registry,
            _force: bool,
        ) -> Result<SyncOutcome> {
            if self.fail_sync.lock().unwrap().contains(&entity.name) {
                return Err(Error::Configuration(format!("backend rejected {}", entity.name)));
            }
            self.calls.lock().unwrap().push(format!("sync:{}", entity.name));
            Ok(SyncOutcome::Created)
        }

        async fn row_count(&mut self, entity: &Entity) -> Result<u64> {
            Ok(self.counts.get(&entity.name).copied().unwrap_or(0))
        }

        async fn insert_row(&mut self, entity: &Entity, values: &RowValues) -> Result<()> {
            if let Some((name, at)) = &self.fail_insert_at {
                if entity.name == *name && self.inserts_seen == *at {
                    return Err(Error::Configuration("row rejected".to_string()));
                }
            }
            self.inserts_seen += 1;
            self.calls
                .lock()
                .unwrap()
                .push(format!("insert:{}:{}", entity.name, values.get("id").cloned().unwrap_or(json!(null))));
            Ok(())
        }
    }

    fn author_book() -> Vec<Entity> {
        vec![
            Entity::new("Book")
                .with_attribute(Attribute::primary_key("id", AttributeType::Integer))
                .with_attribute(Attribute::reference("author_id", "Author")),
            Entity::new("Author")
                .with_attribute(Attribute::primary_key("id", AttributeType::Integer))
                .with_attribute(Attribute::new("name", AttributeType::Text)),
        ]
    }

    fn sync_calls(calls: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("sync:"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_references_synced_before_referencing() {
        let (backend, calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        engine.sync_all(false).await.unwrap();

        assert_eq!(sync_calls(&calls), vec!["sync:Author", "sync:Book"]);
        assert_eq!(engine.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_mutual_cycle_syncs_each_exactly_once() {
        let entities = vec![
            Entity::new("A").with_attribute(Attribute::reference("b_id", "B")),
            Entity::new("B").with_attribute(Attribute::reference("a_id", "A")),
        ];
        let (backend, calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(entities, Box::new(backend)).unwrap();

        engine.sync_all(false).await.unwrap();

        let mut calls = sync_calls(&calls);
        calls.sort();
        assert_eq!(calls, vec!["sync:A", "sync:B"]);
        assert!(engine.is_synced("A"));
        assert!(engine.is_synced("B"));
    }

    #[tokio::test]
    async fn test_self_reference_terminates() {
        let entities = vec![
            Entity::new("Category")
                .with_attribute(Attribute::primary_key("id", AttributeType::Integer))
                .with_attribute(Attribute::reference("parent_id", "Category")),
        ];
        let (backend, calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(entities, Box::new(backend)).unwrap();

        engine.sync_all(false).await.unwrap();
        assert_eq!(sync_calls(&calls), vec!["sync:Category"]);
    }

    #[tokio::test]
    async fn test_second_sync_performs_no_structural_calls() {
        let (backend, calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        engine.sync_all(false).await.unwrap();
        let after_first = sync_calls(&calls).len();

        engine.sync_all(false).await.unwrap();
        engine.sync("Book", false).await.unwrap();
        assert_eq!(sync_calls(&calls).len(), after_first);
    }

    #[tokio::test]
    async fn test_structural_failure_aborts_batch_and_skips_ledger() {
        let (backend, calls) = RecordingBackend::new();
        let fail_sync = backend.fail_sync.clone();
        fail_sync.lock().unwrap().insert("Author".to_string());

        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        let err = engine.sync_all(false).await.unwrap_err();
        assert!(matches!(err, Error::StructuralSync { .. }));
        assert!(!engine.is_synced("Author"));
        assert!(!engine.is_synced("Book"));
        assert!(sync_calls(&calls).is_empty());

        // Clearing the failure lets a retry complete; nothing was left
        // in a half-synced state
        fail_sync.lock().unwrap().clear();
        engine.sync_all(false).await.unwrap();
        assert_eq!(sync_calls(&calls), vec!["sync:Author", "sync:Book"]);
    }

    #[tokio::test]
    async fn test_validation_fails_before_any_sync() {
        let entities = vec![
            Entity::new("Bad")
                .with_attribute(Attribute::new("x", AttributeType::Text))
                .with_attribute(Attribute::new("x", AttributeType::Text)),
        ];
        let (backend, _calls) = RecordingBackend::new();
        let err = SyncEngine::initialize(entities, Box::new(backend)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_entity() {
        let (backend, _calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        let err = engine.sync("Publisher", false).await.unwrap_err();
        assert!(matches!(err, Error::UnknownEntity(_)));

        assert_eq!(engine.references_of("Book").unwrap(), vec!["Author"]);
        assert!(engine.references_of("Publisher").is_err());
    }

    fn fixture_file(rows: serde_json::Value) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(&rows).unwrap()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_fixtures_seed_in_file_order() {
        let (backend, calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        let file = fixture_file(json!([
            {"id": 2, "name": "Grace"},
            {"id": 1, "name": "Ada"}
        ]));
        engine
            .registry_mut()
            .set_fixture_path("Author", file.path().to_path_buf());

        let report = engine.load_fixtures().await.unwrap();
        assert_eq!(report.seeded, 1);
        assert_eq!(report.rows_inserted, 2);

        let inserts: Vec<String> = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("insert:"))
            .cloned()
            .collect();
        assert_eq!(inserts, vec!["insert:Author:2", "insert:Author:1"]);
    }

    #[tokio::test]
    async fn test_fixture_skipped_when_rows_present() {
        let (mut backend, calls) = RecordingBackend::new();
        backend.counts.insert("Author".to_string(), 5);
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        let file = fixture_file(json!([{"id": 1}]));
        engine
            .registry_mut()
            .set_fixture_path("Author", file.path().to_path_buf());

        let report = engine.load_fixtures().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rows_inserted, 0);
        assert!(calls.lock().unwrap().iter().all(|c| !c.starts_with("insert:")));
    }

    #[tokio::test]
    async fn test_row_failure_isolated_to_its_fixture() {
        let (mut backend, calls) = RecordingBackend::new();
        // Sixth insert for Author (index 5) fails
        backend.fail_insert_at = Some(("Author".to_string(), 5));
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        let author_rows: Vec<serde_json::Value> =
            (0..10).map(|i| json!({"id": i, "name": format!("a{i}")})).collect();
        let author_file = fixture_file(json!(author_rows));
        let book_file = fixture_file(json!([{"id": 1, "author_id": 0}]));
        engine
            .registry_mut()
            .set_fixture_path("Author", author_file.path().to_path_buf());
        engine
            .registry_mut()
            .set_fixture_path("Book", book_file.path().to_path_buf());

        let report = engine.load_fixtures().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.seeded, 1);

        let author_inserts = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("insert:Author"))
            .count();
        assert_eq!(author_inserts, 5);
        // The next fixture still ran
        assert!(calls.lock().unwrap().iter().any(|c| c.starts_with("insert:Book")));
    }

    #[tokio::test]
    async fn test_unreadable_fixture_is_isolated() {
        let (backend, _calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        let bad = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(bad.path(), "not json").unwrap();
        let good = fixture_file(json!([{"id": 1, "author_id": null}]));
        engine
            .registry_mut()
            .set_fixture_path("Author", bad.path().to_path_buf());
        engine
            .registry_mut()
            .set_fixture_path("Book", good.path().to_path_buf());

        let report = engine.load_fixtures().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.seeded, 1);
    }

    #[tokio::test]
    async fn test_progress_strictly_increasing_and_ends_at_100() {
        let (backend, _calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.set_progress(Box::new(move |_entity, percent| {
            sink.lock().unwrap().push(percent);
        }));

        let rows: Vec<RowValues> = (0..7)
            .map(|i| {
                let mut row = RowValues::new();
                row.insert("id".to_string(), json!(i));
                row
            })
            .collect();
        engine.populate_data("Author", rows).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!(seen.iter().all(|p| (1..=100).contains(p)));
        assert_eq!(*seen.last().unwrap(), 100);
    }

    #[tokio::test]
    async fn test_unknown_fields_dropped_or_remapped() {
        let (backend, calls) = RecordingBackend::new();
        let mut engine = SyncEngine::initialize(author_book(), Box::new(backend)).unwrap();

        engine.set_field_override(Box::new(|_entity, field, value| {
            (field == "full_name").then(|| ("name".to_string(), value.clone()))
        }));

        let mut row = RowValues::new();
        row.insert("id".to_string(), json!(1));
        row.insert("full_name".to_string(), json!("Ada"));
        row.insert("hobby".to_string(), json!("chess"));
        engine.populate_data("Author", vec![row]).await.unwrap();

        assert_eq!(
            calls.lock().unwrap().last().unwrap(),
            "insert:Author:1"
        );
    }

    struct IdOffset(i64);

    impl ModelExtension for IdOffset {
        fn name(&self) -> &str {
            "id-offset"
        }

        fn decorate_row(&self, _entity: &Entity, mut row: RowValues) -> RowValues {
            if let Some(id) = row.get("id").and_then(serde_json::Value::as_i64) {
                row.insert("id".to_string(), json!(id + self.0));
            }
            row
        }
    }

    #[tokio::test]
    async fn test_extensions_decorate_fixture_rows() {
        let (backend, calls) = RecordingBackend::new();
        let mut extensions = Extensions::new();
        extensions.register(IdOffset(10));

        let mut engine = SyncEngine::with_extensions(
            Registry::from_entities(author_book()),
            Box::new(backend),
            extensions,
        )
        .unwrap();

        let mut row = RowValues::new();
        row.insert("id".to_string(), json!(1));
        engine.populate_data("Author", vec![row]).await.unwrap();

        assert_eq!(calls.lock().unwrap().last().unwrap(), "insert:Author:11");
    }
}
