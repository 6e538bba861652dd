//! Bidirectional mapping between raw Data API JSON and the record graph.
//!
//! Inbound ([`Mapper::to_entity`]) turns nested JSON into records, going
//! through the identity map so every `(type, id)` resolves to one handle,
//! and records a snapshot of what was loaded. Outbound
//! ([`Mapper::to_payload`]) diffs a record against that snapshot and keeps
//! only the changed fields.

mod inbound;
mod outbound;

use crate::identity::IdentityMap;
use crate::payload::{Payload, PayloadValue};
use crate::record::{EntityArena, Handle};
use crate::schema::{Relation, Schema};
use crate::snapshot::SnapshotStore;

/// Mapper state for one unit of work.
#[derive(Debug, Default)]
pub struct Mapper {
    identity: IdentityMap,
    snapshots: SnapshotStore,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Makes the record's current state its new baseline.
    pub fn refresh_snapshot(&mut self, arena: &EntityArena, handle: Handle) {
        self.snapshots.refresh(arena, handle);
    }

    /// Rebaselines every persisted record written nested inside `payload`.
    pub fn refresh_written(&mut self, arena: &EntityArena, payload: &Payload, schema: &Schema) {
        for (name, value) in &payload.fields {
            let Some(Relation::Nested { schema: target }) =
                schema.property(name).and_then(|p| p.kind.relation())
            else {
                continue;
            };
            let nested: Vec<&Payload> = match value {
                PayloadValue::Object(p) => vec![p],
                PayloadValue::Array(items) => items
                    .iter()
                    .filter_map(|item| match item {
                        PayloadValue::Object(p) => Some(p),
                        _ => None,
                    })
                    .collect(),
                _ => continue,
            };
            for written in nested {
                if let Some(handle) = written
                    .id
                    .and_then(|id| self.identity.get_object(&target.type_name, id))
                {
                    self.snapshots.refresh(arena, handle);
                }
                self.refresh_written(arena, written, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::EntityCollection;
    use crate::declaration::{Declarations, EntityDecl};
    use crate::payload::PayloadOutcome;
    use crate::record::Record;
    use crate::schema::Loader;
    use crate::value::Value;
    use serde_json::json;

    fn loader() -> Loader {
        Loader::new(
            Declarations::new()
                .with(
                    EntityDecl::new("Author")
                        .endpoint("authors")
                        .id("id")
                        .scalar("name", "string")
                        .collection("books", "Book"),
                )
                .with(
                    EntityDecl::new("Book")
                        .endpoint("books")
                        .id("id")
                        .scalar("title", "string")
                        .collection("authors", "Author"),
                ),
        )
    }

    #[test]
    fn test_cycle_maps_both_ways() {
        let mut loader = loader();
        let schema = loader.load("Author").unwrap();
        let mut arena = EntityArena::new();
        let mut mapper = Mapper::new();

        let raw = json!({
            "id": 1,
            "name": "Le Guin",
            "books": [
                {"id": 7, "title": "The Dispossessed", "authors": ["/authors/1"]},
                {"id": 8, "title": "Lathe of Heaven", "authors": [{"id": 1}]}
            ]
        });
        let author = mapper.to_entity(&mut arena, &raw, None, &schema).unwrap();

        let books = arena.get(author).unwrap().get("books").unwrap().as_collection().unwrap().clone();
        assert_eq!(books.len(), 2);
        for book in books.iter() {
            let authors = arena.get(book).unwrap().get("authors").unwrap().as_collection().unwrap();
            // The back-reference resolves to the author being mapped
            assert_eq!(authors.first(), Some(author));
        }

        assert_eq!(
            mapper.to_payload(&arena, author, &schema).unwrap(),
            PayloadOutcome::Unchanged
        );

        // Renaming a book sends the book with its back-reference as a link
        let first = books.first().unwrap();
        arena.get_mut(first).unwrap().set("title", "The Dispossessed (2nd ed.)");
        let payload = mapper
            .to_payload(&arena, author, &schema)
            .unwrap()
            .into_payload()
            .unwrap();
        assert_eq!(
            payload.to_wire(),
            json!({
                "@id": "/authors/1",
                "id": 1,
                "books": [
                    {"@id": "/books/7", "id": 7, "title": "The Dispossessed (2nd ed.)"},
                    {"@id": "/books/8", "id": 8}
                ]
            })
        );

        let book_schema = loader.load("Book").unwrap();
        let author_link = mapper.to_payload(&arena, first, &book_schema).unwrap();
        let book_payload = author_link.payload().unwrap();
        assert!(book_payload.get("authors").is_none());
        assert_eq!(
            book_payload.get("title"),
            Some(&PayloadValue::Json(json!("The Dispossessed (2nd ed.)")))
        );
    }

    #[test]
    fn test_new_back_reference_is_left_out() {
        let mut loader = loader();
        let schema = loader.load("Author").unwrap();
        let book_schema = loader.load("Book").unwrap();
        let mut arena = EntityArena::new();
        let mut mapper = Mapper::new();

        let saved = mapper
            .to_entity(&mut arena, &json!({"id": 3, "name": "Saved"}), None, &schema)
            .unwrap();
        let author = arena.insert(Record::for_schema(&schema).with("name", "A"));
        let book = arena.insert(
            Record::for_schema(&book_schema)
                .with("title", "T")
                .with("authors", EntityCollection::from_handles(vec![author, saved])),
        );
        arena
            .get_mut(author)
            .unwrap()
            .set("books", EntityCollection::from_handles(vec![book]));

        let payload = mapper
            .to_payload(&arena, author, &schema)
            .unwrap()
            .into_payload()
            .unwrap();
        assert_eq!(
            payload.to_wire(),
            json!({"name": "A", "books": [{"title": "T", "authors": ["/authors/3"]}]})
        );
    }

    #[test]
    fn test_refresh_snapshot_resets_baseline() {
        let mut loader = loader();
        let schema = loader.load("Book").unwrap();
        let mut arena = EntityArena::new();
        let mut mapper = Mapper::new();

        let book = mapper
            .to_entity(&mut arena, &json!({"id": 3, "title": "A"}), None, &schema)
            .unwrap();
        arena.get_mut(book).unwrap().set("title", Value::from("B"));
        assert!(!mapper.to_payload(&arena, book, &schema).unwrap().is_unchanged());

        mapper.refresh_snapshot(&arena, book);
        assert!(mapper.to_payload(&arena, book, &schema).unwrap().is_unchanged());
    }
}
