//! Topological orderer - global processing order over the reference graph
//!
//! Produces a sequence in which every referenced entity appears before the
//! entities referencing it, ties broken stably by registration order. The
//! orderer never refuses to run: entities caught in a reference cycle are
//! appended at the end in registration order, because termination and
//! exactly-once execution on cycles are guaranteed by the sync engine's
//! ledger, not by this sequence.

use std::collections::{HashMap, HashSet};

use crate::registry::Registry;
use crate::resolver;

/// Entity names in dependency-first processing order.
pub fn sync_order(registry: &Registry) -> Vec<String> {
    let names = registry.names();

    // Dependency counts per entity; self-loops are excluded since they
    // impose no relative ordering
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

    for entity in registry.all() {
        let deps: HashSet<String> = resolver::references_of(entity, registry)
            .into_iter()
            .filter(|dep| dep != &entity.name)
            .collect();

        pending.insert(entity.name.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(entity.name.clone());
        }
    }

    let mut ordered = Vec::with_capacity(names.len());
    let mut emitted: HashSet<String> = HashSet::new();

    // Kahn's algorithm, scanning in registration order each round so that
    // unconstrained entities come out in the order they were registered
    loop {
        let mut progressed = false;

        for name in names {
            if emitted.contains(name) {
                continue;
            }
            if pending.get(name.as_str()).copied().unwrap_or(0) > 0 {
                continue;
            }

            emitted.insert(name.clone());
            ordered.push(name.clone());
            progressed = true;

            if let Some(deps) = dependents.get(name) {
                for dependent in deps.clone() {
                    if let Some(count) = pending.get_mut(dependent.as_str()) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }

        if !progressed {
            break;
        }
    }

    // Cyclic remainder: append in registration order and let the engine's
    // recursive walk sort out the actual execution
    if ordered.len() != names.len() {
        let cyclic: Vec<String> = names
            .iter()
            .filter(|name| !emitted.contains(*name))
            .cloned()
            .collect();
        tracing::warn!(
            "reference cycle involving [{}]; appending in registration order",
            cyclic.join(", ")
        );
        ordered.extend(cyclic);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Attribute, AttributeType, Entity};

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_referenced_before_referencing() {
        let registry = Registry::from_entities(vec![
            Entity::new("Book").with_attribute(Attribute::reference("author_id", "Author")),
            Entity::new("Author"),
        ]);

        let order = sync_order(&registry);
        assert!(position(&order, "Author") < position(&order, "Book"));
    }

    #[test]
    fn test_chain_ordering() {
        let registry = Registry::from_entities(vec![
            Entity::new("Chapter").with_attribute(Attribute::reference("book_id", "Book")),
            Entity::new("Book").with_attribute(Attribute::reference("author_id", "Author")),
            Entity::new("Author"),
        ]);

        let order = sync_order(&registry);
        assert!(position(&order, "Author") < position(&order, "Book"));
        assert!(position(&order, "Book") < position(&order, "Chapter"));
    }

    #[test]
    fn test_unconstrained_entities_keep_registration_order() {
        let registry = Registry::from_entities(vec![
            Entity::new("Zeta"),
            Entity::new("Alpha"),
            Entity::new("Mid"),
        ]);

        let order = sync_order(&registry);
        assert_eq!(order, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_cycle_does_not_lose_entities() {
        let registry = Registry::from_entities(vec![
            Entity::new("A").with_attribute(Attribute::reference("b_id", "B")),
            Entity::new("B").with_attribute(Attribute::reference("a_id", "A")),
            Entity::new("C"),
        ]);

        let order = sync_order(&registry);
        assert_eq!(order.len(), 3);
        // The acyclic entity still comes out first
        assert_eq!(order[0], "C");
        assert!(order.contains(&"A".to_string()));
        assert!(order.contains(&"B".to_string()));
    }

    #[test]
    fn test_self_reference_does_not_block() {
        let registry = Registry::from_entities(vec![
            Entity::new("Category")
                .with_attribute(Attribute::primary_key("id", AttributeType::Integer))
                .with_attribute(Attribute::reference("parent_id", "Category")),
        ]);

        let order = sync_order(&registry);
        assert_eq!(order, vec!["Category"]);
    }
}
