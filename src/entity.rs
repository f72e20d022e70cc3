//! Entity definitions - the schema data model
//!
//! An [`Entity`] describes one persisted collection: a name, a storage
//! table identifier, and an ordered list of attributes. Attributes may
//! reference another entity (by entity name or by table identifier),
//! which is what the resolver and orderer build the dependency graph from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// Storage type of an attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Integer,
    Float,
    #[default]
    Text,
    Boolean,
    Timestamp,
    Json,
}

impl AttributeType {
    /// Stable lowercase name, used in model files and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attribute of an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: AttributeType,

    /// Whether NULL is accepted; primary keys are never nullable in DDL
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    #[serde(default)]
    pub primary_key: bool,

    /// Reference target: another entity's name, or a table identifier
    /// that the registry resolves back to an entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Attribute {
    /// Create a plain (non-key, non-reference) attribute
    pub fn new(name: &str, kind: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: true,
            primary_key: false,
            references: None,
        }
    }

    /// Create a primary key attribute
    pub fn primary_key(name: &str, kind: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: false,
            primary_key: true,
            references: None,
        }
    }

    /// Create an attribute referencing another entity or table
    pub fn reference(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: AttributeType::Integer,
            nullable: true,
            primary_key: false,
            references: Some(target.to_string()),
        }
    }
}

/// A named schema definition with an ordered attribute list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,

    /// Explicit storage table identifier; defaults to the lowercased name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Entity {
    /// Create an entity with no attributes
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: None,
            attributes: Vec::new(),
        }
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// The storage table identifier
    pub fn table_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The primary key attribute; first one found wins
    pub fn primary_key(&self) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.primary_key)
    }

    /// Validate the definition before any sync begins.
    ///
    /// The only structural invariant enforced here is attribute-name
    /// uniqueness; everything else (zero attributes, zero references,
    /// dangling reference targets) is tolerated downstream.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Configuration("entity with empty name".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for attribute in &self.attributes {
            if !seen.insert(attribute.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "duplicate attribute '{}' on entity '{}'",
                    attribute.name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Load fully formed entity definitions from a JSON models file
/// (an array of entity objects)
pub fn load_models(path: &Path) -> Result<Vec<Entity>> {
    let contents = std::fs::read_to_string(path)?;
    let entities: Vec<Entity> = serde_json::from_str(&contents)?;
    Ok(entities)
}
