//! Entity manager and per-type repositories.
//!
//! The [`EntityManager`] is the unit of work: it owns the record arena, the
//! schema loader, the mapper state and the transport. A [`Repository`]
//! borrows the manager for one entity type.

use std::sync::Arc;

use serde_json::Value as Json;

use crate::collection::EntityCollection;
use crate::declaration::Declarations;
use crate::error::{MappingError, Result, SchemaError};
use crate::mapper::Mapper;
use crate::payload::PayloadOutcome;
use crate::record::{EntityArena, Handle, Id, Record};
use crate::schema::{Loader, Schema};
use crate::transport::{QueryParams, Transport};

/// Sort direction for [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    /// Parses a direction; anything but `desc` sorts ascending.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }
}

/// Filters, ordering and paging for collection fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<(String, String)>,
    order: Vec<(String, Direction)>,
    page: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push((field.into(), value.to_string()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.push((field.into(), direction));
        self
    }

    /// Adds ordering from a `"name asc, created desc"` style string.
    pub fn order(mut self, spec: &str) -> Self {
        for part in spec.split(',') {
            let mut words = part.split_whitespace();
            if let Some(field) = words.next() {
                let direction = words.next().map(Direction::parse).unwrap_or(Direction::Asc);
                self.order.push((field.to_string(), direction));
            }
        }
        self
    }

    /// Fetches only this page instead of following pagination.
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page
    }

    /// Query string pairs: filters first, then `order[field]=direction`.
    pub fn to_params(&self) -> QueryParams {
        let mut params = self.filters.clone();
        params.extend(
            self.order
                .iter()
                .map(|(field, direction)| (format!("order[{}]", field), direction.as_str().to_string())),
        );
        params
    }
}

/// Unit of work over one Data API.
#[derive(Debug)]
pub struct EntityManager<T> {
    transport: T,
    loader: Loader,
    mapper: Mapper,
    arena: EntityArena,
}

impl<T: Transport> EntityManager<T> {
    pub fn new(transport: T, declarations: Declarations) -> Self {
        Self {
            transport,
            loader: Loader::new(declarations),
            mapper: Mapper::new(),
            arena: EntityArena::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn arena(&self) -> &EntityArena {
        &self.arena
    }

    pub fn get(&self, handle: Handle) -> Option<&Record> {
        self.arena.get(handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Record> {
        self.arena.get_mut(handle)
    }

    pub fn schema(&mut self, type_name: &str) -> Result<Arc<Schema>, SchemaError> {
        self.loader.load(type_name)
    }

    /// Creates a new, unsaved record of `type_name`.
    pub fn create(&mut self, type_name: &str) -> Result<Handle> {
        let schema = self.schema(type_name)?;
        Ok(self.arena.insert(Record::for_schema(&schema)))
    }

    /// Adds a record built by the caller to the unit of work.
    pub fn attach(&mut self, record: Record) -> Handle {
        self.arena.insert(record)
    }

    pub fn repository(&mut self, type_name: &str) -> Result<Repository<'_, T>> {
        let schema = self.schema(type_name)?;
        Ok(Repository {
            manager: self,
            schema,
        })
    }

    /// Renders a record and its relations as JSON.
    pub fn to_json(&self, handle: Handle) -> Json {
        self.arena.to_json(handle)
    }

    pub async fn save(&mut self, handle: Handle) -> Result<Handle> {
        let type_name = self.type_of(handle)?;
        self.repository(&type_name)?.save(handle).await
    }

    /// Restricts the record to `properties` and saves it.
    ///
    /// The restriction stays on the record for later saves.
    pub async fn save_only<S: AsRef<str>>(&mut self, handle: Handle, properties: &[S]) -> Result<Handle> {
        let type_name = self.type_of(handle)?;
        let schema = self.schema(&type_name)?;
        self.arena
            .get_mut(handle)
            .ok_or(MappingError::UnknownHandle(handle))?
            .send_only(&schema, properties);
        self.save(handle).await
    }

    pub async fn delete(&mut self, handle: Handle) -> Result<bool> {
        let type_name = self.type_of(handle)?;
        self.repository(&type_name)?.delete(handle).await
    }

    fn type_of(&self, handle: Handle) -> Result<String> {
        Ok(self
            .arena
            .get(handle)
            .ok_or(MappingError::UnknownHandle(handle))?
            .type_name()
            .to_string())
    }
}

/// Find, save and delete for one entity type.
pub struct Repository<'a, T> {
    manager: &'a mut EntityManager<T>,
    schema: Arc<Schema>,
}

impl<T: Transport> Repository<'_, T> {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fetches one entity; `None` when the Data API has no such id.
    pub async fn find(&mut self, id: Id) -> Result<Option<Handle>> {
        let m = &mut *self.manager;
        let Some(raw) = m.transport.get_by_id(&self.schema.endpoint, id).await? else {
            return Ok(None);
        };
        let handle = m.mapper.to_entity(&mut m.arena, &raw, None, &self.schema)?;
        Ok(Some(handle))
    }

    /// Fetches every matching entity, or a single page when the query names one.
    pub async fn find_by(&mut self, query: &Query) -> Result<EntityCollection> {
        let m = &mut *self.manager;
        let params = query.to_params();
        let rows = match query.page_number() {
            Some(page) => {
                m.transport
                    .get_page(&self.schema.endpoint, page, &params)
                    .await?
                    .items
            }
            None => m.transport.get(&self.schema.endpoint, &params).await?,
        };

        let mut collection = EntityCollection::from_handles(Vec::with_capacity(rows.len()));
        for row in &rows {
            collection.add(m.mapper.to_entity(&mut m.arena, row, None, &self.schema)?);
        }
        Ok(collection)
    }

    pub async fn find_one_by(&mut self, query: &Query) -> Result<Option<Handle>> {
        Ok(self.find_by(query).await?.first())
    }

    /// Fetches every entity of the type, ordered by a `"field dir, ..."` string.
    pub async fn find_all(&mut self, order: &str) -> Result<EntityCollection> {
        self.find_by(&Query::new().order(order)).await
    }

    /// Computes what saving the record would send.
    pub fn diff(&self, handle: Handle) -> Result<PayloadOutcome> {
        let m = &*self.manager;
        Ok(m.mapper.to_payload(&m.arena, handle, &self.schema)?)
    }

    /// Writes the record's changes and maps the response back into it.
    ///
    /// Nothing is sent when there are no changes. Persisted records are
    /// replaced with `put`, new ones created with `post`.
    pub async fn save(&mut self, handle: Handle) -> Result<Handle> {
        let payload = match self.diff(handle)? {
            PayloadOutcome::Unchanged => {
                tracing::debug!("Nothing to save for {}", self.schema.type_name);
                return Ok(handle);
            }
            PayloadOutcome::Changed(payload) => payload,
        };

        let m = &mut *self.manager;
        let body = payload.to_wire();
        let response = match payload.id {
            Some(id) => m.transport.put(&self.schema.endpoint, id, &body).await?,
            None => m.transport.post(&self.schema.endpoint, &body).await?,
        };

        let saved = m
            .mapper
            .to_entity(&mut m.arena, &response, Some(handle), &self.schema)?;
        m.mapper.refresh_snapshot(&m.arena, saved);
        m.mapper.refresh_written(&m.arena, &payload, &self.schema);
        tracing::info!(
            "Saved {} {} ({} changed)",
            self.schema.type_name,
            m.arena.get(saved).and_then(Record::id).unwrap_or_default(),
            payload.len()
        );
        Ok(saved)
    }

    /// Deletes the record; a record never saved is simply reported deleted.
    pub async fn delete(&mut self, handle: Handle) -> Result<bool> {
        let m = &mut *self.manager;
        let id = m
            .arena
            .get(handle)
            .ok_or(MappingError::UnknownHandle(handle))?
            .id();
        let Some(id) = id else {
            return Ok(true);
        };
        let deleted = m.transport.delete(&self.schema.endpoint, id).await?;
        tracing::info!("Deleted {} {}", self.schema.type_name, id);
        Ok(deleted)
    }
}
