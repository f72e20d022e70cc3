//! DDL and statement generation from entity definitions

use crate::entity::{Attribute, AttributeType, Entity};
use crate::registry::Registry;

/// SQLite column type for an attribute type
pub fn sql_type(kind: AttributeType) -> &'static str {
    match kind {
        AttributeType::Integer | AttributeType::Boolean => "INTEGER",
        AttributeType::Float => "REAL",
        AttributeType::Text | AttributeType::Timestamp | AttributeType::Json => "TEXT",
    }
}

fn column_def(attribute: &Attribute) -> String {
    let mut def = format!("{} {}", attribute.name, sql_type(attribute.kind));
    if attribute.primary_key {
        def.push_str(" PRIMARY KEY");
    } else if !attribute.nullable {
        def.push_str(" NOT NULL");
    }
    def
}

/// Foreign-key clause for a reference attribute, if its target resolves
/// to a known entity with a primary key
fn foreign_key_clause(attribute: &Attribute, registry: &Registry) -> Option<String> {
    let target = attribute.references.as_deref()?;
    let entity = registry.get(target).or_else(|| registry.resolve_table(target))?;
    let pk = entity.primary_key()?;
    Some(format!(
        "FOREIGN KEY ({}) REFERENCES {}({})",
        attribute.name,
        entity.table_name(),
        pk.name
    ))
}

/// CREATE TABLE IF NOT EXISTS statement for an entity
pub fn create_table(entity: &Entity, registry: &Registry) -> String {
    let mut parts: Vec<String> = entity.attributes.iter().map(column_def).collect();
    parts.extend(
        entity
            .attributes
            .iter()
            .filter_map(|a| foreign_key_clause(a, registry)),
    );

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        entity.table_name(),
        parts.join(",\n    ")
    )
}

/// DROP TABLE IF EXISTS statement for an entity
pub fn drop_table(entity: &Entity) -> String {
    format!("DROP TABLE IF EXISTS {}", entity.table_name())
}

/// Index statements for the entity's reference columns
pub fn reference_indexes(entity: &Entity) -> Vec<String> {
    let table = entity.table_name();
    entity
        .attributes
        .iter()
        .filter(|a| a.references.is_some())
        .map(|a| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{col} ON {table}({col})",
                table = table,
                col = a.name
            )
        })
        .collect()
}

/// All statements a non-destructive structural sync executes
pub fn sync_statements(entity: &Entity, registry: &Registry) -> Vec<String> {
    let mut statements = vec![create_table(entity, registry)];
    statements.extend(reference_indexes(entity));
    statements
}

/// Parameterized INSERT statement for the given columns
pub fn insert_row(entity: &Entity, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        entity.table_name(),
        columns.join(", "),
        placeholders.join(", ")
    )
}
