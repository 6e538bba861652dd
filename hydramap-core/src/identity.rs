//! Identity map: one canonical live record per `(type, id)`.
//!
//! Records that only carry their id are tracked as hollow. When fuller data
//! for a cached key shows up, it is copied into the cached record so every
//! holder of the canonical handle observes it.

use std::collections::{HashMap, HashSet};

use serde_json::Value as Json;

use crate::record::{EntityArena, EntityKey, Handle, Id, Record};
use crate::schema::Schema;
use crate::value::{json_is_empty, Value};

/// Outcome of looking up raw data for a possibly cached entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Nothing cached for this key; map into a fresh record.
    Miss,
    /// Cached and nothing new to learn; the raw data can be dropped.
    Hit(Handle),
    /// Cached but hollow or less complete than the raw data; map into it.
    Refresh(Handle),
}

#[derive(Debug, Default)]
pub struct IdentityMap {
    objects: HashMap<EntityKey, Handle>,
    hollow: HashSet<EntityKey>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record and returns the canonical handle for its key.
    ///
    /// New records are never cached and come back unchanged. If another
    /// record is already cached for the key, the incoming values are copied
    /// into it when the cached one is hollow (and the incoming one is not)
    /// or when the incoming record is fuller.
    pub fn add_object(&mut self, arena: &mut EntityArena, handle: Handle, hollow: bool) -> Handle {
        let Some(key) = arena.get(handle).and_then(Record::key) else {
            return handle;
        };

        let Some(canonical) = self.objects.get(&key).copied() else {
            if hollow {
                self.hollow.insert(key.clone());
            }
            self.objects.insert(key, handle);
            return handle;
        };

        if canonical != handle {
            let was_hollow = self.hollow.contains(&key) && !hollow;
            let incoming = arena.get(handle).cloned();
            if let (Some(incoming), Some(target)) = (incoming, arena.get_mut(canonical)) {
                if was_hollow || record_is_fuller(target, &incoming) {
                    tracing::debug!("Copying fuller data for {} into cached instance", key);
                    target.merge_from(&incoming);
                }
            }
        }

        if !hollow && self.hollow.remove(&key) {
            tracing::debug!("Promoted hollow {}", key);
        }
        canonical
    }

    pub fn get_object(&self, type_name: &str, id: Id) -> Option<Handle> {
        self.objects.get(&EntityKey::new(type_name, id)).copied()
    }

    pub fn is_hollow(&self, type_name: &str, id: Id) -> bool {
        self.hollow.contains(&EntityKey::new(type_name, id))
    }

    /// True when `raw` has a non-empty value for a declared property the
    /// cached record holds no value for.
    ///
    /// Only properties declared in `schema` count, so an id-only payload is
    /// never fuller. A property going from populated to empty is not
    /// detected either.
    pub fn is_fuller(&self, arena: &EntityArena, handle: Handle, raw: &Json, schema: &Schema) -> bool {
        let (Some(record), Some(object)) = (arena.get(handle), raw.as_object()) else {
            return false;
        };
        schema
            .properties
            .iter()
            .filter(|p| !p.write_only)
            .any(|p| {
                object.get(&p.name).is_some_and(|v| !json_is_empty(v))
                    && record.get(&p.name).is_none_or(Value::is_empty)
            })
    }

    /// Decides whether raw data for `(type_name, id)` needs mapping.
    pub fn lookup(
        &self,
        arena: &EntityArena,
        type_name: &str,
        id: Id,
        raw: &Json,
        schema: &Schema,
    ) -> Lookup {
        match self.get_object(type_name, id) {
            None => Lookup::Miss,
            Some(handle) => {
                if self.is_hollow(type_name, id) || self.is_fuller(arena, handle, raw, schema) {
                    Lookup::Refresh(handle)
                } else {
                    Lookup::Hit(handle)
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn record_is_fuller(current: &Record, incoming: &Record) -> bool {
    incoming
        .fields()
        .any(|(name, value)| !value.is_empty() && current.get(name).is_none_or(Value::is_empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{Declarations, EntityDecl};
    use crate::schema::Loader;
    use serde_json::json;

    fn user_schema() -> std::sync::Arc<Schema> {
        let decls = Declarations::new().with(
            EntityDecl::new("User")
                .endpoint("users")
                .id("id")
                .scalar("name", "string")
                .scalar("email", "string"),
        );
        Loader::new(decls).load("User").unwrap()
    }

    #[test]
    fn test_new_records_are_not_cached() {
        let mut arena = EntityArena::new();
        let mut map = IdentityMap::new();
        let h = arena.insert(Record::new("User", "users").with("name", "Ann"));

        assert_eq!(map.add_object(&mut arena, h, false), h);
        assert!(map.is_empty());
    }

    #[test]
    fn test_one_canonical_instance_per_key() {
        let mut arena = EntityArena::new();
        let mut map = IdentityMap::new();
        let first = arena.insert(Record::new("User", "users").with_id(1).with("name", "Ann"));
        let second = arena.insert(Record::new("User", "users").with_id(1).with("name", "Other"));

        assert_eq!(map.add_object(&mut arena, first, false), first);
        assert_eq!(map.add_object(&mut arena, second, false), first);
        assert_eq!(map.get_object("User", 1), Some(first));
        // Not fuller: the cached name is kept
        assert_eq!(
            arena.get(first).unwrap().get("name").and_then(Value::as_str),
            Some("Ann")
        );
    }

    #[test]
    fn test_hollow_promotion_updates_in_place() {
        let mut arena = EntityArena::new();
        let mut map = IdentityMap::new();
        let hollow = arena.insert(Record::new("User", "users").with_id(5));
        map.add_object(&mut arena, hollow, true);
        assert!(map.is_hollow("User", 5));

        let full = arena.insert(Record::new("User", "users").with_id(5).with("name", "X"));
        let canonical = map.add_object(&mut arena, full, false);

        assert_eq!(canonical, hollow);
        assert!(!map.is_hollow("User", 5));
        assert_eq!(
            arena.get(hollow).unwrap().get("name").and_then(Value::as_str),
            Some("X")
        );
    }

    #[test]
    fn test_is_fuller() {
        let schema = user_schema();
        let mut arena = EntityArena::new();
        let map = IdentityMap::new();
        let h = arena.insert(Record::new("User", "users").with_id(1).with("name", "Ann"));

        assert!(map.is_fuller(&arena, h, &json!({"id": 1, "email": "a@x.io"}), &schema));
        assert!(!map.is_fuller(&arena, h, &json!({"id": 1, "name": "Bob"}), &schema));
        assert!(!map.is_fuller(&arena, h, &json!({"id": 1}), &schema));
        assert!(!map.is_fuller(&arena, h, &json!({"id": 1, "@type": "User"}), &schema));
        assert!(!map.is_fuller(&arena, h, &json!("/users/1"), &schema));
    }

    #[test]
    fn test_cleared_field_is_not_fuller() {
        let schema = user_schema();
        let mut arena = EntityArena::new();
        let map = IdentityMap::new();
        let h = arena.insert(Record::new("User", "users").with_id(1).with("name", "Ann"));

        // A legitimate clear of `name` is not detected.
        assert!(!map.is_fuller(&arena, h, &json!({"id": 1, "name": null}), &schema));
    }

    #[test]
    fn test_lookup() {
        let schema = user_schema();
        let mut arena = EntityArena::new();
        let mut map = IdentityMap::new();
        assert_eq!(map.lookup(&arena, "User", 1, &json!({"id": 1}), &schema), Lookup::Miss);

        let h = arena.insert(Record::new("User", "users").with_id(1));
        map.add_object(&mut arena, h, true);
        assert_eq!(
            map.lookup(&arena, "User", 1, &json!({"id": 1}), &schema),
            Lookup::Refresh(h)
        );

        arena.get_mut(h).unwrap().set("name", "Ann");
        map.add_object(&mut arena, h, false);
        assert_eq!(
            map.lookup(&arena, "User", 1, &json!({"id": 1, "name": "Ann"}), &schema),
            Lookup::Hit(h)
        );
        assert_eq!(
            map.lookup(&arena, "User", 1, &json!({"id": 1, "email": "a@x.io"}), &schema),
            Lookup::Refresh(h)
        );
    }
}
