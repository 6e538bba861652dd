//! Records to minimal write payloads.

use crate::error::MappingError;
use crate::payload::{Payload, PayloadOutcome, PayloadValue};
use crate::record::{EntityArena, Handle, Record};
use crate::schema::{PropertyKind, PropertySchema, Relation, Schema};
use crate::snapshot::{Baseline, Snapshot, SnapshotRef};
use crate::value::{Scalar, Value};

use super::Mapper;

impl Mapper {
    /// Diffs a record against its snapshot.
    ///
    /// Returns [`PayloadOutcome::Unchanged`] when there is nothing to write
    /// beyond the id.
    pub fn to_payload(
        &self,
        arena: &EntityArena,
        handle: Handle,
        schema: &Schema,
    ) -> Result<PayloadOutcome, MappingError> {
        let record = arena.get(handle).ok_or(MappingError::UnknownHandle(handle))?;
        let baseline = record.key().and_then(|key| self.snapshots.get_snapshot(&key));

        let mut path = vec![schema.type_name.clone()];
        let payload = self.build_payload(arena, record, schema, baseline, &mut path)?;

        if payload.is_empty() {
            tracing::debug!("No changes for {}", schema.type_name);
            Ok(PayloadOutcome::Unchanged)
        } else {
            Ok(PayloadOutcome::Changed(payload))
        }
    }

    fn build_payload(
        &self,
        arena: &EntityArena,
        record: &Record,
        schema: &Schema,
        baseline: Option<&Snapshot>,
        path: &mut Vec<String>,
    ) -> Result<Payload, MappingError> {
        let mut payload = Payload::new(record.endpoint(), record.id());

        for property in &schema.properties {
            if property.read_only || !record.sends(&property.name) {
                continue;
            }
            if property.reader.is_none() {
                return Err(MappingError::NoGetter {
                    entity: schema.type_name.clone(),
                    property: property.name.clone(),
                });
            }

            let base = baseline.and_then(|b| b.get(&property.name));
            let candidate = match record.get(&property.name).filter(|v| !is_unset(v)) {
                None => {
                    if base.is_none_or(Baseline::is_empty) {
                        continue;
                    }
                    PayloadValue::Null
                }
                Some(value) => {
                    match self.candidate(arena, schema, property, value, base, path)? {
                        Some(candidate) => candidate,
                        None => continue,
                    }
                }
            };

            if !self.snapshots.equal_after_mapping(&candidate, base) {
                payload.insert(property.name.clone(), candidate);
            }
        }

        Ok(payload)
    }

    fn candidate(
        &self,
        arena: &EntityArena,
        schema: &Schema,
        property: &PropertySchema,
        value: &Value,
        base: Option<&Baseline>,
        path: &mut Vec<String>,
    ) -> Result<Option<PayloadValue>, MappingError> {
        match (&property.kind, value) {
            (PropertyKind::Scalar { .. }, Value::Scalar(scalar)) => {
                Ok(Some(PayloadValue::Json(scalar.to_json())))
            }
            (PropertyKind::Reference { target }, Value::Ref(handle)) => {
                let item_base = match base {
                    Some(Baseline::Entity(r)) => Some(r),
                    _ => None,
                };
                self.related(arena, *handle, target, item_base, path)
            }
            (PropertyKind::Collection { target }, Value::Collection(collection)) => {
                let base_items: &[SnapshotRef] = match base {
                    Some(Baseline::Collection { items, .. }) => items.as_slice(),
                    _ => &[],
                };
                let mut items = Vec::with_capacity(collection.len());
                for (i, handle) in collection.iter().enumerate() {
                    if let Some(item) = self.related(arena, handle, target, base_items.get(i), path)? {
                        items.push(item);
                    }
                }
                Ok(Some(PayloadValue::Array(items)))
            }
            (kind, value) => Err(MappingError::KindMismatch {
                entity: schema.type_name.clone(),
                property: property.name.clone(),
                expected: kind.name(),
                found: value.kind_name(),
            }),
        }
    }

    /// Renders a related record: nested when its type is not yet on the
    /// path, otherwise a link (or nothing when it has no id yet).
    fn related(
        &self,
        arena: &EntityArena,
        handle: Handle,
        relation: &Relation,
        base: Option<&SnapshotRef>,
        path: &mut Vec<String>,
    ) -> Result<Option<PayloadValue>, MappingError> {
        let record = arena.get(handle).ok_or(MappingError::UnknownHandle(handle))?;

        let schema = match relation {
            Relation::Nested { schema } if !path.iter().any(|t| *t == schema.type_name) => schema,
            _ => return Ok(record.link().map(PayloadValue::Link)),
        };

        let baseline = match record.key() {
            Some(key) => self.snapshots.get_snapshot(&key),
            None => match base {
                Some(SnapshotRef::Embedded(snapshot)) => Some(snapshot.as_ref()),
                _ => None,
            },
        };

        path.push(schema.type_name.clone());
        let nested = self.build_payload(arena, record, schema, baseline, path);
        path.pop();

        nested.map(|p| Some(PayloadValue::Object(p)))
    }
}

/// Values the outbound side treats as absent.
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Scalar(Scalar::Json(json)) => json.is_null(),
        Value::Collection(c) => !c.is_initialized() && c.is_empty(),
        _ => false,
    }
}
