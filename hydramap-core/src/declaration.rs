//! Declarative entity metadata.
//!
//! Declarations are the input of the schema loader: which endpoint an entity
//! lives at, which property is its id, and how every other property is typed.
//! They can be built in code or read from YAML/JSON:
//!
//! ```yaml
//! - name: User
//!   endpoint: users
//!   properties:
//!     - { name: id, id: true }
//!     - { name: name, type: string }
//!     - { name: groups, entity: Group, collection: true }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Accessors an entity type exposes for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Accessors {
    pub get: bool,
    pub has: bool,
    pub is: bool,
    pub set: bool,
}

impl Default for Accessors {
    fn default() -> Self {
        Self {
            get: true,
            has: false,
            is: false,
            set: true,
        }
    }
}

impl Accessors {
    /// No accessors at all; only useful together with `public`.
    pub fn none() -> Self {
        Self {
            get: false,
            has: false,
            is: false,
            set: false,
        }
    }
}

fn default_type() -> String {
    "string".to_string()
}

/// A single declared property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    /// Scalar type name; ignored when `entity` is set.
    #[serde(rename = "type", default = "default_type")]
    pub type_name: String,
    /// Referenced entity type, if this is a relation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub write_only: bool,
    #[serde(default)]
    pub read_only: bool,
    /// Public properties are read and written directly.
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub accessors: Accessors,
}

impl PropertyDecl {
    pub fn scalar(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            entity: None,
            id: false,
            collection: false,
            write_only: false,
            read_only: false,
            public: false,
            accessors: Accessors::default(),
        }
    }

    pub fn id(name: impl Into<String>) -> Self {
        Self {
            id: true,
            ..Self::scalar(name, "integer")
        }
    }

    pub fn reference(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            ..Self::scalar(name, default_type())
        }
    }

    pub fn collection(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            collection: true,
            ..Self::reference(name, entity)
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn with_accessors(mut self, accessors: Accessors) -> Self {
        self.accessors = accessors;
        self
    }
}

/// Declaration of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
}

impl EntityDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            properties: Vec::new(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    pub fn id(self, name: impl Into<String>) -> Self {
        self.property(PropertyDecl::id(name))
    }

    pub fn scalar(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.property(PropertyDecl::scalar(name, type_name))
    }

    pub fn reference(self, name: impl Into<String>, entity: impl Into<String>) -> Self {
        self.property(PropertyDecl::reference(name, entity))
    }

    pub fn collection(self, name: impl Into<String>, entity: impl Into<String>) -> Self {
        self.property(PropertyDecl::collection(name, entity))
    }
}

/// Registry of all known entity declarations, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    entities: HashMap<String, EntityDecl>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a declaration, replacing any previous one with the same name.
    pub fn register(&mut self, decl: EntityDecl) -> &mut Self {
        self.entities.insert(decl.name.clone(), decl);
        self
    }

    pub fn with(mut self, decl: EntityDecl) -> Self {
        self.register(decl);
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntityDecl> {
        self.entities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Parses a YAML list of entity declarations.
    pub fn from_yaml_str(s: &str) -> Result<Self, SchemaError> {
        let decls: Vec<EntityDecl> =
            serde_yaml::from_str(s).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Ok(decls.into_iter().fold(Self::new(), Self::with))
    }

    /// Parses a JSON array of entity declarations.
    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        let decls: Vec<EntityDecl> =
            serde_json::from_str(s).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Ok(decls.into_iter().fold(Self::new(), Self::with))
    }
}
