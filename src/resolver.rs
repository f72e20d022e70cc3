//! Dependency resolver - derives the entities an entity references
//!
//! Reference edges are computed on demand from attribute descriptors and
//! never cached: a reference target is either another entity's name, or a
//! table identifier resolved back to an entity through the registry's
//! reverse index. Targets that resolve to nothing are dropped with a log;
//! they model tables managed outside this system.

use crate::entity::Entity;
use crate::registry::Registry;

/// The set of entity names `entity` directly references.
///
/// Deduplicated, in first-mention attribute order. Self-references are
/// not filtered here; the sync engine treats them as immediately
/// satisfied.
pub fn references_of(entity: &Entity, registry: &Registry) -> Vec<String> {
    let mut refs = Vec::new();

    for attribute in &entity.attributes {
        let Some(target) = attribute.references.as_deref() else {
            continue;
        };

        // Direct entity-name match wins; otherwise try the table index
        let resolved = if registry.get(target).is_some() {
            Some(target.to_string())
        } else {
            registry.resolve_table(target).map(|e| e.name.clone())
        };

        match resolved {
            Some(name) => {
                if !refs.contains(&name) {
                    refs.push(name);
                }
            }
            None => {
                tracing::debug!(
                    "dropping reference {}.{} -> '{}': no such entity or table",
                    entity.name,
                    attribute.name,
                    target
                );
            }
        }
    }

    refs
}
