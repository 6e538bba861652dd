//! Resolved per-type schemas.
//!
//! A [`Schema`] is what the mapper works from: the endpoint, the id field and
//! an ordered list of property descriptors with their accessors already
//! resolved. Schemas are produced once per type by the [`Loader`].

mod loader;

pub use loader::Loader;

use std::sync::Arc;

use serde::Serialize;

use crate::value::ScalarType;

/// How a property value is read from an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reader {
    /// Public property, read directly.
    Field,
    Get,
    Has,
    Is,
}

/// Target of a reference or collection property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum Relation {
    /// Fully resolved target schema.
    Nested { schema: Arc<Schema> },
    /// The target type is already on the resolution path; only enough is
    /// kept to build links and hollow entities.
    BackReference {
        type_name: String,
        endpoint: String,
        id_property: String,
    },
}

impl Relation {
    pub fn type_name(&self) -> &str {
        match self {
            Relation::Nested { schema } => &schema.type_name,
            Relation::BackReference { type_name, .. } => type_name,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Relation::Nested { schema } => &schema.endpoint,
            Relation::BackReference { endpoint, .. } => endpoint,
        }
    }

    pub fn id_property(&self) -> &str {
        match self {
            Relation::Nested { schema } => &schema.id_property,
            Relation::BackReference { id_property, .. } => id_property,
        }
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Relation::Nested { schema } => Some(schema),
            Relation::BackReference { .. } => None,
        }
    }

    pub fn is_back_reference(&self) -> bool {
        matches!(self, Relation::BackReference { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyKind {
    Scalar { scalar: ScalarType },
    Reference { target: Relation },
    Collection { target: Relation },
}

impl PropertyKind {
    pub fn relation(&self) -> Option<&Relation> {
        match self {
            PropertyKind::Scalar { .. } => None,
            PropertyKind::Reference { target } | PropertyKind::Collection { target } => {
                Some(target)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PropertyKind::Scalar { .. } => "scalar",
            PropertyKind::Reference { .. } => "reference",
            PropertyKind::Collection { .. } => "collection",
        }
    }
}

/// Descriptor of a single declared property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    pub name: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
    pub write_only: bool,
    pub read_only: bool,
    /// `None` when the entity exposes no way to read the property.
    pub reader: Option<Reader>,
    pub writable: bool,
}

/// Resolved schema of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub type_name: String,
    pub endpoint: String,
    pub id_property: String,
    pub properties: Vec<PropertySchema>,
}

impl Schema {
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_properties(&self) -> bool {
        !self.properties.is_empty()
    }
}
