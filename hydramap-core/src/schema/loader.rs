//! Builds and caches schemas from entity declarations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::declaration::{Declarations, EntityDecl, PropertyDecl};
use crate::error::SchemaError;
use crate::value::ScalarType;

use super::{PropertyKind, PropertySchema, Reader, Relation, Schema};

/// Schema loader with per-type memoization.
///
/// Relations are resolved recursively. The types on the current resolution
/// path are threaded through as an explicit chain; a relation to a type
/// already on the chain is stored as [`Relation::BackReference`] instead of
/// being descended into, which is what makes mutually referential types
/// loadable.
#[derive(Debug)]
pub struct Loader {
    declarations: Declarations,
    cache: HashMap<String, Arc<Schema>>,
    /// Sub-schemas keyed by (parent type, target type).
    nested: HashMap<(String, String), Arc<Schema>>,
}

impl Loader {
    pub fn new(declarations: Declarations) -> Self {
        Self {
            declarations,
            cache: HashMap::new(),
            nested: HashMap::new(),
        }
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    /// Returns the schema for `type_name`, building it on first use.
    pub fn load(&mut self, type_name: &str) -> Result<Arc<Schema>, SchemaError> {
        if let Some(schema) = self.cache.get(type_name) {
            return Ok(Arc::clone(schema));
        }

        let decl = self.declaration(type_name)?;
        let endpoint = endpoint_of(&decl)?;
        let mut chain = vec![decl.name.clone()];
        let (id_property, properties) = self.parse_properties(&decl, &mut chain)?;

        let schema = Arc::new(Schema {
            type_name: decl.name.clone(),
            endpoint,
            id_property,
            properties,
        });
        tracing::debug!(
            "Loaded schema for {} ({} properties)",
            type_name,
            schema.properties.len()
        );

        self.cache.insert(type_name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Number of top-level schemas built so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn declaration(&self, type_name: &str) -> Result<EntityDecl, SchemaError> {
        self.declarations
            .get(type_name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownType(type_name.to_string()))
    }

    fn parse_properties(
        &mut self,
        decl: &EntityDecl,
        chain: &mut Vec<String>,
    ) -> Result<(String, Vec<PropertySchema>), SchemaError> {
        let mut id_property = None;
        let mut properties = Vec::with_capacity(decl.properties.len());

        for prop in &decl.properties {
            if prop.id {
                id_property = Some(prop.name.clone());
                continue;
            }

            let kind = match &prop.entity {
                Some(target) => {
                    let target = self.resolve_relation(target, chain)?;
                    if prop.collection {
                        PropertyKind::Collection { target }
                    } else {
                        PropertyKind::Reference { target }
                    }
                }
                None => {
                    let scalar = ScalarType::from_name(&prop.type_name).ok_or_else(|| {
                        SchemaError::UnknownScalarType {
                            entity: decl.name.clone(),
                            property: prop.name.clone(),
                            type_name: prop.type_name.clone(),
                        }
                    })?;
                    PropertyKind::Scalar { scalar }
                }
            };

            properties.push(PropertySchema {
                name: prop.name.clone(),
                kind,
                write_only: prop.write_only,
                read_only: prop.read_only,
                reader: reader_of(prop),
                writable: prop.public || prop.accessors.set,
            });
        }

        Ok((id_property.unwrap_or_else(|| "id".to_string()), properties))
    }

    fn resolve_relation(
        &mut self,
        target: &str,
        chain: &mut Vec<String>,
    ) -> Result<Relation, SchemaError> {
        let target_decl = self.declaration(target)?;

        if chain.iter().any(|t| t == target) {
            return Ok(Relation::BackReference {
                type_name: target_decl.name.clone(),
                endpoint: endpoint_of(&target_decl)?,
                id_property: id_property_of(&target_decl),
            });
        }

        let parent = chain.last().cloned().unwrap_or_default();
        let key = (parent, target.to_string());
        if let Some(schema) = self.nested.get(&key) {
            return Ok(Relation::Nested {
                schema: Arc::clone(schema),
            });
        }

        let endpoint = endpoint_of(&target_decl)?;
        chain.push(target.to_string());
        let parsed = self.parse_properties(&target_decl, chain);
        chain.pop();
        let (id_property, properties) = parsed?;

        let schema = Arc::new(Schema {
            type_name: target_decl.name.clone(),
            endpoint,
            id_property,
            properties,
        });
        self.nested.insert(key, Arc::clone(&schema));
        Ok(Relation::Nested { schema })
    }
}

fn endpoint_of(decl: &EntityDecl) -> Result<String, SchemaError> {
    match decl.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => Ok(endpoint.to_string()),
        _ => Err(SchemaError::MissingEndpoint(decl.name.clone())),
    }
}

fn id_property_of(decl: &EntityDecl) -> String {
    decl.properties
        .iter()
        .find(|p| p.id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "id".to_string())
}

/// Accessor priority: direct field access, then get, has, is.
fn reader_of(prop: &PropertyDecl) -> Option<Reader> {
    if prop.public {
        Some(Reader::Field)
    } else if prop.accessors.get {
        Some(Reader::Get)
    } else if prop.accessors.has {
        Some(Reader::Has)
    } else if prop.accessors.is {
        Some(Reader::Is)
    } else {
        None
    }
}
