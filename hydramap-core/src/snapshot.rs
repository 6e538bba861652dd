//! Change-tracking baselines.
//!
//! A [`Snapshot`] is a detached picture of a record taken right after it
//! was loaded. It shares nothing with the live graph: persisted neighbours
//! are kept as keys and resolved through the store, embedded neighbours
//! without an id are copied in. The outbound mapper diffs against it.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value as Json;

use crate::payload::PayloadValue;
use crate::record::{link, parse_link, EntityArena, EntityKey, Handle, Id, Record};
use crate::value::{Scalar, Value};

/// Baseline of a single entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub type_name: String,
    pub id: Option<Id>,
    pub fields: BTreeMap<String, Baseline>,
}

/// Baseline of a single property.
#[derive(Debug, Clone, PartialEq)]
pub enum Baseline {
    Scalar(Scalar),
    Entity(SnapshotRef),
    Collection {
        items: Vec<SnapshotRef>,
        initialized: bool,
    },
}

/// How a baseline points at another entity.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotRef {
    /// Persisted entity; its own snapshot lives in the store.
    Persisted { key: EntityKey, endpoint: String },
    /// Entity without an id, copied in place.
    Embedded(Box<Snapshot>),
}

impl SnapshotRef {
    pub fn id(&self) -> Option<Id> {
        match self {
            SnapshotRef::Persisted { key, .. } => Some(key.id),
            SnapshotRef::Embedded(snapshot) => snapshot.id,
        }
    }
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&Baseline> {
        self.fields.get(name)
    }
}

impl Baseline {
    /// Whether this baseline counts as "nothing to unset".
    pub fn is_empty(&self) -> bool {
        match self {
            Baseline::Scalar(s) => matches!(s, Scalar::Json(Json::Null)),
            Baseline::Entity(_) => false,
            Baseline::Collection { items, .. } => items.is_empty(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<EntityKey, Snapshot>,
    hollow: HashSet<EntityKey>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the baseline of a persisted record.
    ///
    /// A second call for the same key is ignored unless it promotes a
    /// hollow baseline to a full one.
    pub fn add_snapshot(&mut self, arena: &EntityArena, handle: Handle, hollow: bool) {
        let Some(key) = arena.get(handle).and_then(Record::key) else {
            return;
        };
        if self.snapshots.contains_key(&key) && (hollow || !self.hollow.contains(&key)) {
            return;
        }
        self.store(arena, handle, key, hollow);
    }

    /// Replaces the baseline with the record's current state.
    pub fn refresh(&mut self, arena: &EntityArena, handle: Handle) {
        if let Some(key) = arena.get(handle).and_then(Record::key) {
            self.store(arena, handle, key, false);
        }
    }

    pub fn get_snapshot(&self, key: &EntityKey) -> Option<&Snapshot> {
        self.snapshots.get(key)
    }

    pub fn is_hollow(&self, key: &EntityKey) -> bool {
        self.hollow.contains(key)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn store(&mut self, arena: &EntityArena, handle: Handle, key: EntityKey, hollow: bool) {
        let mut visited = HashSet::new();
        let Some(snapshot) = capture(arena, handle, &mut visited) else {
            return;
        };
        tracing::debug!("Snapshot taken for {} (hollow: {})", key, hollow);
        if hollow {
            self.hollow.insert(key.clone());
        } else {
            self.hollow.remove(&key);
        }
        self.snapshots.insert(key, snapshot);
    }

    /// Whether an outbound candidate value matches its baseline.
    ///
    /// `None` stands for an absent baseline, which compares like `null`.
    pub fn equal_after_mapping(&self, candidate: &PayloadValue, baseline: Option<&Baseline>) -> bool {
        match (candidate, baseline) {
            (PayloadValue::Null, None) => true,
            (PayloadValue::Null, Some(b)) => b.is_empty(),
            (PayloadValue::Json(v), Some(Baseline::Scalar(s))) => json_equal(v, &s.to_json()),
            (PayloadValue::Json(Json::Null), None) => true,
            (PayloadValue::Link(l), Some(Baseline::Entity(SnapshotRef::Persisted { key, endpoint }))) => {
                *l == link(endpoint, key.id)
            }
            (PayloadValue::Object(p), Some(Baseline::Entity(r))) => {
                p.fields.is_empty() && p.id == r.id()
            }
            (PayloadValue::Array(items), Some(Baseline::Collection { items: base, .. })) => {
                items.len() == base.len()
                    && items
                        .iter()
                        .zip(base)
                        .all(|(item, r)| stub_id(item).is_some_and(|id| id == r.id()))
            }
            _ => false,
        }
    }
}

/// Id of an outbound item that carries nothing but its identity.
fn stub_id(item: &PayloadValue) -> Option<Option<Id>> {
    match item {
        PayloadValue::Object(p) if p.fields.is_empty() => Some(p.id),
        PayloadValue::Link(l) => parse_link(l).map(|(_, id)| Some(id)),
        _ => None,
    }
}

fn json_equal(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

fn capture(arena: &EntityArena, handle: Handle, visited: &mut HashSet<Handle>) -> Option<Snapshot> {
    let record = arena.get(handle)?;
    if !visited.insert(handle) {
        return None;
    }

    let mut fields = BTreeMap::new();
    for (name, value) in record.fields() {
        let baseline = match value {
            Value::Scalar(s) => Some(Baseline::Scalar(s.clone())),
            Value::Ref(target) => capture_ref(arena, *target, visited).map(Baseline::Entity),
            Value::Collection(c) => Some(Baseline::Collection {
                items: c
                    .iter()
                    .filter_map(|h| capture_ref(arena, h, visited))
                    .collect(),
                initialized: c.is_initialized(),
            }),
        };
        if let Some(baseline) = baseline {
            fields.insert(name.to_string(), baseline);
        }
    }

    visited.remove(&handle);
    Some(Snapshot {
        type_name: record.type_name().to_string(),
        id: record.id(),
        fields,
    })
}

fn capture_ref(arena: &EntityArena, handle: Handle, visited: &mut HashSet<Handle>) -> Option<SnapshotRef> {
    let record = arena.get(handle)?;
    match record.key() {
        Some(key) => Some(SnapshotRef::Persisted {
            key,
            endpoint: record.endpoint().to_string(),
        }),
        None => capture(arena, handle, visited).map(|s| SnapshotRef::Embedded(Box::new(s))),
    }
}
