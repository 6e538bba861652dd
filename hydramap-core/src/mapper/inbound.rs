//! Raw JSON to records.

use serde_json::{Map, Value as Json};

use crate::collection::EntityCollection;
use crate::error::MappingError;
use crate::identity::Lookup;
use crate::record::{parse_link, EntityArena, Handle, Id, Record};
use crate::schema::{PropertyKind, PropertySchema, Relation, Schema};
use crate::value::Value;

use super::Mapper;

impl Mapper {
    /// Maps raw data into a record and returns its canonical handle.
    ///
    /// With a `target`, values are written into that record (used to map a
    /// write response back into the saved entity). Without one, raw data for
    /// an already cached id is only mapped when the cached record is hollow
    /// or less complete; otherwise the cached handle is returned as is.
    pub fn to_entity(
        &mut self,
        arena: &mut EntityArena,
        raw: &Json,
        target: Option<Handle>,
        schema: &Schema,
    ) -> Result<Handle, MappingError> {
        let object = match raw {
            Json::Object(object) if schema.has_properties() => object,
            _ => {
                return self.hollow_or_cached(
                    arena,
                    raw,
                    &schema.type_name,
                    &schema.endpoint,
                    &schema.id_property,
                )
            }
        };
        let id = raw_id(object, &schema.id_property);

        let mut refreshing = false;
        let handle = match (target, id) {
            (Some(handle), _) => handle,
            (None, Some(id)) => {
                match self
                    .identity
                    .lookup(arena, &schema.type_name, id, raw, schema)
                {
                    Lookup::Hit(handle) => {
                        tracing::debug!("Cache hit for {}::{}", schema.type_name, id);
                        return Ok(handle);
                    }
                    Lookup::Refresh(handle) => {
                        refreshing = true;
                        handle
                    }
                    Lookup::Miss => arena.insert(Record::for_schema(schema)),
                }
            }
            (None, None) => arena.insert(Record::for_schema(schema)),
        };

        if let Some(id) = id {
            record_mut(arena, handle)?.set_id(Some(id));
        }

        let mut populated = false;
        for property in &schema.properties {
            if property.write_only {
                continue;
            }
            let Some(raw_value) = object.get(&property.name).filter(|v| !v.is_null()) else {
                continue;
            };
            if !property.writable {
                return Err(MappingError::NoSetter {
                    entity: schema.type_name.clone(),
                    property: property.name.clone(),
                });
            }

            let value = self.map_property(arena, schema, property, raw_value)?;
            record_mut(arena, handle)?.set(property.name.clone(), value);
            populated = true;
        }

        let hollow = !populated;
        let canonical = self.identity.add_object(arena, handle, hollow);
        if refreshing && !hollow {
            self.snapshots.refresh(arena, canonical);
        } else {
            self.snapshots.add_snapshot(arena, canonical, hollow);
        }
        Ok(canonical)
    }

    fn map_property(
        &mut self,
        arena: &mut EntityArena,
        schema: &Schema,
        property: &PropertySchema,
        raw: &Json,
    ) -> Result<Value, MappingError> {
        match &property.kind {
            PropertyKind::Scalar { scalar } => {
                scalar
                    .coerce(raw)
                    .map(Value::Scalar)
                    .ok_or_else(|| MappingError::InvalidValue {
                        entity: schema.type_name.clone(),
                        property: property.name.clone(),
                        expected: scalar.to_string(),
                        value: raw.to_string(),
                    })
            }
            PropertyKind::Reference { target } => {
                self.cached_or_mapped(arena, raw, target).map(Value::Ref)
            }
            PropertyKind::Collection { target } => {
                let Json::Array(rows) = raw else {
                    return Err(MappingError::KindMismatch {
                        entity: schema.type_name.clone(),
                        property: property.name.clone(),
                        expected: "array",
                        found: json_kind(raw),
                    });
                };
                let handles = rows
                    .iter()
                    .map(|row| self.cached_or_mapped(arena, row, target))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Collection(EntityCollection::from_handles(handles)))
            }
        }
    }

    /// Resolves a related value: a link or back-reference becomes a hollow
    /// (or cached) record, a nested object is mapped in full.
    fn cached_or_mapped(
        &mut self,
        arena: &mut EntityArena,
        raw: &Json,
        relation: &Relation,
    ) -> Result<Handle, MappingError> {
        match relation {
            Relation::Nested { schema } if raw.is_object() => {
                self.to_entity(arena, raw, None, schema)
            }
            _ => self.hollow_or_cached(
                arena,
                raw,
                relation.type_name(),
                relation.endpoint(),
                relation.id_property(),
            ),
        }
    }

    /// Returns the cached record for the id `raw` points at, or registers a
    /// hollow one.
    fn hollow_or_cached(
        &mut self,
        arena: &mut EntityArena,
        raw: &Json,
        type_name: &str,
        endpoint: &str,
        id_property: &str,
    ) -> Result<Handle, MappingError> {
        let id = match raw {
            Json::String(s) => Some(link_id(s)?),
            Json::Number(n) => Some(n.as_i64().ok_or_else(|| MappingError::InvalidLink(raw.to_string()))?),
            Json::Object(object) => raw_id(object, id_property),
            _ => return Err(MappingError::InvalidLink(raw.to_string())),
        };

        let Some(id) = id else {
            // Nothing to identify it by: a fresh, untracked record
            return Ok(arena.insert(Record::new(type_name, endpoint)));
        };
        if let Some(handle) = self.identity.get_object(type_name, id) {
            return Ok(handle);
        }

        let handle = arena.insert(Record::new(type_name, endpoint).with_id(id));
        let canonical = self.identity.add_object(arena, handle, true);
        self.snapshots.add_snapshot(arena, canonical, true);
        tracing::debug!("Registered hollow {}::{}", type_name, id);
        Ok(canonical)
    }
}

fn record_mut(arena: &mut EntityArena, handle: Handle) -> Result<&mut Record, MappingError> {
    arena
        .get_mut(handle)
        .ok_or(MappingError::UnknownHandle(handle))
}

/// Reads the id from the declared id property, falling back to `@id`.
fn raw_id(object: &Map<String, Json>, id_property: &str) -> Option<Id> {
    let declared = object.get(id_property).and_then(|v| match v {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.parse().ok(),
        _ => None,
    });
    declared.or_else(|| {
        object
            .get("@id")
            .and_then(Json::as_str)
            .and_then(parse_link)
            .map(|(_, id)| id)
    })
}

fn link_id(link: &str) -> Result<Id, MappingError> {
    parse_link(link)
        .map(|(_, id)| id)
        .ok_or_else(|| MappingError::InvalidLink(link.to_string()))
}

fn json_kind(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
