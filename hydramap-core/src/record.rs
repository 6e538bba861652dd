//! Live entity records and the arena that owns them.
//!
//! Every entity in a unit of work lives in an [`EntityArena`] and is
//! addressed by a [`Handle`]. Relations between entities store handles, so
//! updating a record in place is visible to every holder of its handle.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde_json::{Map, Value as Json};

use crate::schema::Schema;
use crate::value::Value;

/// Identifier assigned by the Data API.
pub type Id = i64;

/// Stable address of a record inside an [`EntityArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Identity of a persisted entity: its type and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub type_name: String,
    pub id: Id,
}

impl EntityKey {
    pub fn new(type_name: impl Into<String>, id: Id) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.id)
    }
}

/// Builds the compact `/endpoint/id` form of a reference.
pub fn link(endpoint: &str, id: Id) -> String {
    format!("/{}/{}", endpoint.trim_matches('/'), id)
}

/// Splits a `/endpoint/id` link into its endpoint and id.
pub fn parse_link(s: &str) -> Option<(&str, Id)> {
    let s = s.strip_prefix('/')?;
    let (endpoint, id) = s.rsplit_once('/')?;
    let id = id.parse::<Id>().ok()?;
    Some((endpoint, id))
}

/// A single entity: its type, id and property values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    endpoint: String,
    id: Option<Id>,
    fields: BTreeMap<String, Value>,
    send_only: Option<Vec<String>>,
}

impl Record {
    pub fn new(type_name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            endpoint: endpoint.into(),
            id: None,
            fields: BTreeMap::new(),
            send_only: None,
        }
    }

    /// Creates an empty record for the type described by `schema`.
    pub fn for_schema(schema: &Schema) -> Self {
        Self::new(&schema.type_name, &schema.endpoint)
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn id(&self) -> Option<Id> {
        self.id
    }

    pub fn set_id(&mut self, id: Option<Id>) {
        self.id = id;
    }

    /// A record without an id has not been persisted yet.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn key(&self) -> Option<EntityKey> {
        self.id.map(|id| EntityKey::new(&self.type_name, id))
    }

    /// The `/endpoint/id` link for a persisted record.
    pub fn link(&self) -> Option<String> {
        self.id.map(|id| link(&self.endpoint, id))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Removes a value, leaving the property unset.
    pub fn clear(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties holding a non-empty value.
    pub fn populated_count(&self) -> usize {
        self.fields.values().filter(|v| !v.is_empty()).count()
    }

    /// Restricts outbound payloads to the given properties.
    ///
    /// Names not present in `schema` are dropped.
    pub fn send_only<S: AsRef<str>>(&mut self, schema: &Schema, properties: &[S]) {
        let names = properties
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| schema.property(name).is_some())
            .map(str::to_string)
            .collect();
        self.send_only = Some(names);
    }

    /// Sends only the id on the next write.
    pub fn send_only_id(&mut self) {
        self.send_only = Some(Vec::new());
    }

    pub fn send_all(&mut self) {
        self.send_only = None;
    }

    /// Whether `name` passes the outbound allow-list.
    pub fn sends(&self, name: &str) -> bool {
        match &self.send_only {
            Some(names) => names.iter().any(|n| n == name),
            None => true,
        }
    }

    /// Field-by-field equality, optionally ignoring the id.
    pub fn same_values(&self, other: &Record, ignore_id: bool) -> bool {
        self.type_name == other.type_name
            && (ignore_id || self.id == other.id)
            && self.fields == other.fields
    }

    /// Copies every value held by `other` into this record.
    ///
    /// Values `other` does not hold are left untouched.
    pub(crate) fn merge_from(&mut self, other: &Record) {
        for (name, value) in &other.fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }
}

/// Owner of all records in a unit of work.
#[derive(Debug, Default)]
pub struct EntityArena {
    records: Vec<Record>,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: Record) -> Handle {
        self.records.push(record);
        Handle(self.records.len() - 1)
    }

    pub fn get(&self, handle: Handle) -> Option<&Record> {
        self.records.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Record> {
        self.records.get_mut(handle.0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> {
        (0..self.records.len()).map(Handle)
    }

    /// Renders a record and everything reachable from it as JSON.
    ///
    /// A record already rendered on the current path is rendered as its
    /// link instead, so cyclic graphs terminate.
    pub fn to_json(&self, handle: Handle) -> Json {
        let mut path = HashSet::new();
        self.render(handle, &mut path)
    }

    fn render(&self, handle: Handle, path: &mut HashSet<Handle>) -> Json {
        let Some(record) = self.get(handle) else {
            return Json::Null;
        };
        if !path.insert(handle) {
            return record.link().map(Json::String).unwrap_or(Json::Null);
        }

        let mut object = Map::new();
        if let Some(id) = record.id() {
            object.insert("id".to_string(), Json::from(id));
        }
        for (name, value) in record.fields() {
            let rendered = match value {
                Value::Scalar(s) => s.to_json(),
                Value::Ref(h) => self.render(*h, path),
                Value::Collection(c) => {
                    Json::Array(c.iter().map(|h| self.render(h, path)).collect())
                }
            };
            object.insert(name.to_string(), rendered);
        }

        path.remove(&handle);
        Json::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_roundtrip() {
        assert_eq!(link("/users/", 5), "/users/5");
        assert_eq!(parse_link("/users/5"), Some(("users", 5)));
        assert_eq!(parse_link("/api/users/12"), Some(("api/users", 12)));
        assert_eq!(parse_link("users/5"), None);
        assert_eq!(parse_link("/users/abc"), None);
    }

    #[test]
    fn test_record_basics() {
        let mut record = Record::new("User", "users").with("name", "Ann");
        assert!(record.is_new());
        assert!(record.key().is_none());

        record.set_id(Some(3));
        assert_eq!(record.key(), Some(EntityKey::new("User", 3)));
        assert_eq!(record.link().as_deref(), Some("/users/3"));
        assert_eq!(record.get("name").and_then(Value::as_str), Some("Ann"));

        record.clear("name");
        assert!(record.get("name").is_none());
    }

    #[test]
    fn test_populated_count_ignores_empty() {
        let record = Record::new("User", "users")
            .with("name", "Ann")
            .with("email", "")
            .with("blocked", false);
        assert_eq!(record.populated_count(), 1);
    }

    #[test]
    fn test_same_values_ignoring_id() {
        let a = Record::new("User", "users").with("name", "Ann");
        let b = Record::new("User", "users").with("name", "Ann").with_id(4);
        assert!(!a.same_values(&b, false));
        assert!(a.same_values(&b, true));
    }

    #[test]
    fn test_render_cycle_uses_link() {
        let mut arena = EntityArena::new();
        let a = arena.insert(Record::new("A", "as").with_id(1));
        let b = arena.insert(Record::new("B", "bs").with_id(2));
        arena.get_mut(a).unwrap().set("b", Value::Ref(b));
        arena.get_mut(b).unwrap().set("a", Value::Ref(a));

        assert_eq!(
            arena.to_json(a),
            json!({"id": 1, "b": {"id": 2, "a": "/as/1"}})
        );
    }
}
