//! Extension framework
//!
//! Extensions are registered explicitly by the caller rather than
//! discovered on disk. Two capability seams exist: attribute providers
//! (extra attributes merged into matching entities before validation) and
//! row decorators (applied to every fixture row in registration order,
//! each wrapping the output of the previous one).

use crate::entity::{Attribute, Entity};
use crate::registry::Registry;
use crate::storage::RowValues;

/// A typed extension object
pub trait ModelExtension: Send {
    /// Name for diagnostics
    fn name(&self) -> &str;

    /// Extra attributes to merge into `entity`.
    ///
    /// Attributes whose name collides with an existing one are skipped;
    /// the entity's own definition wins.
    fn attributes(&self, _entity: &Entity) -> Vec<Attribute> {
        Vec::new()
    }

    /// Rewrite a fixture row before insertion
    fn decorate_row(&self, _entity: &Entity, row: RowValues) -> RowValues {
        row
    }
}

/// Ordered collection of registered extensions
#[derive(Default)]
pub struct Extensions {
    extensions: Vec<Box<dyn ModelExtension>>,
}

impl Extensions {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension; composition order is registration order
    pub fn register(&mut self, extension: impl ModelExtension + 'static) {
        self.extensions.push(Box::new(extension));
    }

    /// Number of registered extensions
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether no extensions are registered
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Merge provided attributes into every registered entity.
    ///
    /// Runs once at initialization, before validation, so provided
    /// attributes are subject to the same uniqueness checks.
    pub fn apply_attributes(&self, registry: &mut Registry) {
        let names = registry.names().to_vec();
        for name in names {
            let Some(entity) = registry.get(&name) else {
                continue;
            };
            let mut entity = entity.clone();
            let mut changed = false;

            for extension in &self.extensions {
                for attribute in extension.attributes(&entity) {
                    if entity.attribute(&attribute.name).is_some() {
                        tracing::debug!(
                            "extension '{}' attribute '{}' collides on entity '{}'; skipped",
                            extension.name(),
                            attribute.name,
                            entity.name
                        );
                        continue;
                    }
                    entity.attributes.push(attribute);
                    changed = true;
                }
            }

            if changed {
                registry.register(entity);
            }
        }
    }

    /// Run a row through every decorator in registration order
    pub fn decorate_row(&self, entity: &Entity, mut row: RowValues) -> RowValues {
        for extension in &self.extensions {
            row = extension.decorate_row(entity, row);
        }
        row
    }
}
