//! Entity registry - single source of truth for loaded definitions
//!
//! Built once at initialization and read-only afterwards, except for
//! lazily attached runtime metadata (per-entity fixture paths). All
//! lookups go through the registry; nothing else holds entity state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::entity::Entity;

/// Mapping from entity name to [`Entity`], preserving registration order.
#[derive(Debug, Default)]
pub struct Registry {
    /// All entities indexed by name
    entities: HashMap<String, Entity>,
    /// Names in the order they were registered
    order: Vec<String>,
    /// Reverse index: table identifier -> entity name
    by_table: HashMap<String, String>,
    /// Runtime metadata: entity name -> fixture file path
    fixtures: HashMap<String, PathBuf>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a sequence of entities
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut registry = Self::new();
        for entity in entities {
            registry.register(entity);
        }
        registry
    }

    /// Insert or replace an entity
    pub fn register(&mut self, entity: Entity) {
        let name = entity.name.clone();

        if let Some(previous) = self.entities.get(&name) {
            // Replacement: drop the stale table index entry
            self.by_table.remove(&previous.table_name());
        } else {
            self.order.push(name.clone());
        }

        self.by_table.insert(entity.table_name(), name.clone());
        self.entities.insert(name, entity);
    }

    /// Get an entity by name
    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// All entities in registration order
    pub fn all(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    /// Entity names in registration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolve a table identifier back to its entity
    pub fn resolve_table(&self, table: &str) -> Option<&Entity> {
        self.by_table.get(table).and_then(|name| self.entities.get(name))
    }

    /// Attach a fixture source to an entity
    pub fn set_fixture_path(&mut self, name: &str, path: PathBuf) {
        self.fixtures.insert(name.to_string(), path);
    }

    /// The fixture source attached to an entity, if any
    pub fn fixture_path(&self, name: &str) -> Option<&Path> {
        self.fixtures.get(name).map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Attribute, AttributeType};

    #[test]
    fn test_register_and_get() {
        let mut registry = Registry::new();
        registry.register(Entity::new("Author"));
        registry.register(Entity::new("Book"));

        assert_eq!(registry.get("Author").unwrap().name, "Author");
        assert!(registry.get("Publisher").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_all_preserves_registration_order() {
        let mut registry = Registry::new();
        registry.register(Entity::new("Zeta"));
        registry.register(Entity::new("Alpha"));
        registry.register(Entity::new("Mid"));

        let names: Vec<_> = registry.all().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = Registry::new();
        registry.register(Entity::new("Author"));
        registry.register(
            Entity::new("Author")
                .with_attribute(Attribute::primary_key("id", AttributeType::Integer)),
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Author").unwrap().attributes.len(), 1);
    }

    #[test]
    fn test_resolve_table() {
        let mut registry = Registry::new();
        let mut author = Entity::new("Author");
        author.table = Some("authors".to_string());
        registry.register(author);
        registry.register(Entity::new("Book"));

        assert_eq!(registry.resolve_table("authors").unwrap().name, "Author");
        // Default table identifier is the lowercased name
        assert_eq!(registry.resolve_table("book").unwrap().name, "Book");
        assert!(registry.resolve_table("publishers").is_none());
    }

    #[test]
    fn test_replacement_drops_stale_table_index() {
        let mut registry = Registry::new();
        let mut author = Entity::new("Author");
        author.table = Some("authors_v1".to_string());
        registry.register(author);

        let mut author = Entity::new("Author");
        author.table = Some("authors_v2".to_string());
        registry.register(author);

        assert!(registry.resolve_table("authors_v1").is_none());
        assert_eq!(registry.resolve_table("authors_v2").unwrap().name, "Author");
    }

    #[test]
    fn test_fixture_metadata() {
        let mut registry = Registry::new();
        registry.register(Entity::new("Author"));

        assert!(registry.fixture_path("Author").is_none());
        registry.set_fixture_path("Author", PathBuf::from("fixtures/Author.json"));
        assert_eq!(
            registry.fixture_path("Author").unwrap(),
            Path::new("fixtures/Author.json")
        );
    }
}
