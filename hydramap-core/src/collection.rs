//! Ordered, identity-aware collection of entities.

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::seq::IndexedRandom;

use crate::record::{EntityArena, Handle, Id, Record};
use crate::value::Value;

/// An ordered list of entity handles.
///
/// Membership is identity-aware: two persisted entities are the same member
/// when their ids match; a new entity matches another entity with the same
/// values (ignoring the id when only one side has one). The `initialized`
/// flag tells "fetched and empty" apart from "never fetched".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCollection {
    items: Vec<Handle>,
    initialized: bool,
}

impl EntityCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// An initialized collection holding `items`.
    pub fn from_handles(items: Vec<Handle>) -> Self {
        Self {
            items,
            initialized: true,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_initialized(&mut self, initialized: bool) -> &mut Self {
        self.initialized = initialized;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Handle> + '_ {
        self.items.iter().copied()
    }

    pub fn handles(&self) -> &[Handle] {
        &self.items
    }

    pub fn first(&self) -> Option<Handle> {
        self.items.first().copied()
    }

    pub fn add(&mut self, handle: Handle) {
        self.items.push(handle);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn contains(&self, arena: &EntityArena, needle: Handle) -> bool {
        self.position(arena, needle).is_some()
    }

    /// Returns the member matching `needle`, if any.
    pub fn find(&self, arena: &EntityArena, needle: Handle) -> Option<Handle> {
        self.position(arena, needle).map(|i| self.items[i])
    }

    /// Removes the member matching `needle`.
    pub fn remove_element(&mut self, arena: &EntityArena, needle: Handle) -> Option<Handle> {
        self.position(arena, needle).map(|i| self.items.remove(i))
    }

    pub fn get_by_id(&self, arena: &EntityArena, id: Id) -> Option<Handle> {
        self.iter()
            .find(|h| arena.get(*h).and_then(Record::id) == Some(id))
    }

    /// Ids of all persisted members, in order.
    pub fn keys(&self, arena: &EntityArena) -> Vec<Id> {
        self.iter()
            .filter_map(|h| arena.get(h).and_then(Record::id))
            .collect()
    }

    pub fn first_matching<F>(&self, arena: &EntityArena, mut filter: F) -> Option<Handle>
    where
        F: FnMut(&Record) -> bool,
    {
        self.iter()
            .find(|h| arena.get(*h).is_some_and(&mut filter))
    }

    pub fn count_matching<F>(&self, arena: &EntityArena, mut filter: F) -> usize
    where
        F: FnMut(&Record) -> bool,
    {
        self.iter()
            .filter(|h| arena.get(*h).is_some_and(&mut filter))
            .count()
    }

    /// Picks a random member among those accepted by `filter`.
    pub fn random<F>(&self, arena: &EntityArena, mut filter: F) -> Option<Handle>
    where
        F: FnMut(&Record) -> bool,
    {
        let candidates: Vec<Handle> = self
            .iter()
            .filter(|h| arena.get(*h).is_some_and(&mut filter))
            .collect();
        candidates.choose(&mut rand::rng()).copied()
    }

    /// Members sorted by the value `key` extracts; the sort is stable.
    pub fn sorted_by<K, F>(&self, arena: &EntityArena, mut key: F, ascending: bool) -> Vec<Handle>
    where
        K: PartialOrd,
        F: FnMut(&Record) -> Option<K>,
    {
        let mut keyed: Vec<(Option<K>, Handle)> = self
            .iter()
            .map(|h| (arena.get(h).and_then(&mut key), h))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| {
            let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        keyed.into_iter().map(|(_, h)| h).collect()
    }

    /// Projects members into a map keyed by one property (or `id`).
    ///
    /// Members without a scalar value for `key_field` are skipped; later
    /// members win on duplicate keys.
    pub fn to_map_by(&self, arena: &EntityArena, key_field: &str) -> HashMap<String, Handle> {
        self.iter()
            .filter_map(|h| {
                let record = arena.get(h)?;
                Some((key_of(record, key_field)?, h))
            })
            .collect()
    }

    /// Projects members into a map keyed by `key_field` and valued by `value_field`.
    pub fn to_map_of(
        &self,
        arena: &EntityArena,
        key_field: &str,
        value_field: &str,
    ) -> HashMap<String, Option<Value>> {
        self.iter()
            .filter_map(|h| {
                let record = arena.get(h)?;
                let key = key_of(record, key_field)?;
                let value = if value_field == "id" {
                    record.id().map(Value::from)
                } else {
                    record.get(value_field).cloned()
                };
                Some((key, value))
            })
            .collect()
    }

    fn position(&self, arena: &EntityArena, needle: Handle) -> Option<usize> {
        let needle_record = arena.get(needle)?;
        self.items.iter().position(|&h| {
            if h == needle {
                return true;
            }
            arena
                .get(h)
                .is_some_and(|record| same_member(record, needle_record))
        })
    }
}

/// Membership rule shared by `contains`, `find` and `remove_element`.
pub fn same_member(a: &Record, b: &Record) -> bool {
    match (a.id(), b.id()) {
        (None, None) => a.same_values(b, false),
        (None, Some(_)) | (Some(_), None) => a.same_values(b, true),
        (Some(x), Some(y)) => a.type_name() == b.type_name() && x == y,
    }
}

fn key_of(record: &Record, field: &str) -> Option<String> {
    if field == "id" {
        return record.id().map(|id| id.to_string());
    }
    record.get(field)?.as_scalar().map(|s| s.key_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(arena: &mut EntityArena, id: Option<Id>, name: &str, age: i64) -> Handle {
        let mut record = Record::new("User", "users").with("name", name).with("age", age);
        record.set_id(id);
        arena.insert(record)
    }

    #[test]
    fn test_new_members_compare_by_value() {
        let mut arena = EntityArena::new();
        let a = user(&mut arena, None, "Ann", 30);
        let same = user(&mut arena, None, "Ann", 30);
        let other = user(&mut arena, None, "Bob", 30);

        let mut collection = EntityCollection::new();
        collection.add(a);

        assert!(collection.contains(&arena, same));
        assert!(!collection.contains(&arena, other));
    }

    #[test]
    fn test_new_matches_persisted_ignoring_id() {
        let mut arena = EntityArena::new();
        let local = user(&mut arena, None, "Ann", 30);
        let stored = user(&mut arena, Some(8), "Ann", 30);

        let mut collection = EntityCollection::new();
        collection.add(local);
        assert_eq!(collection.find(&arena, stored), Some(local));
    }

    #[test]
    fn test_persisted_members_compare_by_id() {
        let mut arena = EntityArena::new();
        let a = user(&mut arena, Some(1), "Ann", 30);
        let renamed = user(&mut arena, Some(1), "Anna", 31);
        let other = user(&mut arena, Some(2), "Ann", 30);

        let mut collection = EntityCollection::new();
        collection.add(a);
        assert!(collection.contains(&arena, renamed));
        assert!(!collection.contains(&arena, other));

        assert_eq!(collection.remove_element(&arena, renamed), Some(a));
        assert!(collection.is_empty());
    }

    #[test]
    fn test_lookup_and_keys() {
        let mut arena = EntityArena::new();
        let a = user(&mut arena, Some(1), "Ann", 30);
        let b = user(&mut arena, Some(2), "Bob", 25);
        let c = user(&mut arena, None, "Cid", 40);
        let collection = EntityCollection::from_handles(vec![a, b, c]);

        assert_eq!(collection.get_by_id(&arena, 2), Some(b));
        assert_eq!(collection.get_by_id(&arena, 3), None);
        assert_eq!(collection.keys(&arena), vec![1, 2]);
        assert_eq!(
            collection.first_matching(&arena, |r| r.get("age").and_then(Value::as_i64) > Some(26)),
            Some(a)
        );
        assert_eq!(collection.count_matching(&arena, Record::is_new), 1);
    }

    #[test]
    fn test_sorted_by_is_stable() {
        let mut arena = EntityArena::new();
        let a = user(&mut arena, Some(1), "Ann", 30);
        let b = user(&mut arena, Some(2), "Bob", 25);
        let c = user(&mut arena, Some(3), "Cid", 30);
        let collection = EntityCollection::from_handles(vec![a, b, c]);

        let age = |r: &Record| r.get("age").and_then(Value::as_i64);
        assert_eq!(collection.sorted_by(&arena, age, true), vec![b, a, c]);
        assert_eq!(collection.sorted_by(&arena, age, false), vec![a, c, b]);
    }

    #[test]
    fn test_projections() {
        let mut arena = EntityArena::new();
        let a = user(&mut arena, Some(1), "Ann", 30);
        let b = user(&mut arena, Some(2), "Bob", 25);
        let collection = EntityCollection::from_handles(vec![a, b]);

        let by_name = collection.to_map_by(&arena, "name");
        assert_eq!(by_name.get("Bob"), Some(&b));

        let names = collection.to_map_of(&arena, "id", "name");
        assert_eq!(names.get("1"), Some(&Some(Value::from("Ann"))));
    }

    #[test]
    fn test_random_respects_filter() {
        let mut arena = EntityArena::new();
        let a = user(&mut arena, Some(1), "Ann", 30);
        let b = user(&mut arena, Some(2), "Bob", 25);
        let collection = EntityCollection::from_handles(vec![a, b]);

        for _ in 0..10 {
            let picked = collection.random(&arena, |r| r.id() == Some(2));
            assert_eq!(picked, Some(b));
        }
        assert_eq!(collection.random(&arena, |_| false), None);
    }

    #[test]
    fn test_initialized_flag() {
        let mut collection = EntityCollection::new();
        assert!(!collection.is_initialized());
        collection.set_initialized(true);
        assert!(collection.is_initialized());
        assert!(collection.is_empty());
    }
}
