//! In-process transport that keeps resources in memory.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use super::{parse_ids, Page, Transport};
use crate::error::TransportError;
use crate::record::{link, Id};

/// A request received by [`InMemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetById { endpoint: String, id: Id },
    GetPage { endpoint: String, page: u32, query: Vec<(String, String)> },
    Post { endpoint: String, body: Json },
    Put { endpoint: String, id: Id, body: Json },
    Delete { endpoint: String, id: Id },
}

/// Resource store keyed by endpoint and id.
///
/// Collections support equality filters on top-level fields and
/// `order[field]=asc|desc`. Every call is recorded.
#[derive(Debug)]
pub struct InMemoryTransport {
    resources: RefCell<BTreeMap<String, BTreeMap<Id, Json>>>,
    calls: RefCell<Vec<Call>>,
    next_id: Cell<Id>,
    page_size: usize,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self {
            resources: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            page_size: 30,
        }
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Stores a resource, assigning an id when it has none, and returns the id.
    pub fn insert(&self, endpoint: &str, resource: Json) -> Id {
        let mut resource = match resource {
            Json::Object(object) => object,
            _ => Map::new(),
        };
        let id = match resource.get("id").and_then(Json::as_i64) {
            Some(id) => {
                if id >= self.next_id.get() {
                    self.next_id.set(id + 1);
                }
                id
            }
            None => self.allocate_id(),
        };
        resource.insert("id".to_string(), Json::from(id));
        resource.insert("@id".to_string(), Json::String(link(endpoint, id)));
        self.resources
            .borrow_mut()
            .entry(endpoint.to_string())
            .or_default()
            .insert(id, Json::Object(resource));
        id
    }

    pub fn resource(&self, endpoint: &str, id: Id) -> Option<Json> {
        self.resources
            .borrow()
            .get(endpoint)
            .and_then(|items| items.get(&id))
            .cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Number of `post`, `put` and `delete` calls received.
    pub fn write_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Post { .. } | Call::Put { .. } | Call::Delete { .. }))
            .count()
    }

    fn allocate_id(&self) -> Id {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn record(&self, call: Call) {
        tracing::debug!("In-memory call: {:?}", call);
        self.calls.borrow_mut().push(call);
    }

    fn not_found(method: &'static str, endpoint: &str, id: Id) -> TransportError {
        TransportError::Status {
            method,
            url: link(endpoint, id),
            status: 404,
            body: "Not Found".to_string(),
        }
    }
}

fn matches_filters(resource: &Json, query: &[(String, String)]) -> bool {
    query
        .iter()
        .filter(|(key, _)| !key.starts_with("order[") && key != "page")
        .all(|(key, expected)| match resource.get(key) {
            Some(Json::String(s)) => s == expected,
            Some(other) => other.to_string() == *expected,
            None => false,
        })
}

fn ordering(query: &[(String, String)]) -> Vec<(String, bool)> {
    query
        .iter()
        .filter_map(|(key, direction)| {
            let field = key.strip_prefix("order[")?.strip_suffix(']')?;
            Some((field.to_string(), direction != "desc"))
        })
        .collect()
}

fn compare(a: &Json, b: &Json, order: &[(String, bool)]) -> Ordering {
    for (field, ascending) in order {
        let ord = match (a.get(field), b.get(field)) {
            (Some(Json::Number(x)), Some(Json::Number(y))) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Some(Json::String(x)), Some(Json::String(y))) => x.cmp(y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            _ => Ordering::Equal,
        };
        let ord = if *ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Merges `body` into `target`, dropping transport-only keys.
fn merge_body(target: &mut Map<String, Json>, body: &Json) {
    if let Json::Object(fields) = body {
        for (key, value) in fields {
            if key != "@id" && key != "id" {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

impl Transport for InMemoryTransport {
    async fn get_by_id(&self, endpoint: &str, id: Id) -> Result<Option<Json>, TransportError> {
        self.record(Call::GetById {
            endpoint: endpoint.to_string(),
            id,
        });
        Ok(self.resource(endpoint, id).map(parse_ids))
    }

    async fn get_page(
        &self,
        endpoint: &str,
        page: u32,
        query: &[(String, String)],
    ) -> Result<Page, TransportError> {
        self.record(Call::GetPage {
            endpoint: endpoint.to_string(),
            page,
            query: query.to_vec(),
        });

        let resources = self.resources.borrow();
        let Some(items) = resources.get(endpoint) else {
            return Ok(Page::empty());
        };
        let mut matching: Vec<&Json> = items.values().filter(|r| matches_filters(r, query)).collect();
        let order = ordering(query);
        matching.sort_by(|a, b| compare(a, b, &order));

        let total_pages = matching.len().div_ceil(self.page_size).max(1) as u32;
        let start = (page.max(1) as usize - 1) * self.page_size;
        let items = matching
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .map(parse_ids)
            .collect();
        Ok(Page { items, total_pages })
    }

    async fn post(&self, endpoint: &str, body: &Json) -> Result<Json, TransportError> {
        self.record(Call::Post {
            endpoint: endpoint.to_string(),
            body: body.clone(),
        });
        let mut resource = Map::new();
        merge_body(&mut resource, body);
        let id = self.insert(endpoint, Json::Object(resource));
        let stored = self.resource(endpoint, id).unwrap_or(Json::Null);
        Ok(parse_ids(stored))
    }

    async fn put(&self, endpoint: &str, id: Id, body: &Json) -> Result<Json, TransportError> {
        self.record(Call::Put {
            endpoint: endpoint.to_string(),
            id,
            body: body.clone(),
        });
        let mut resources = self.resources.borrow_mut();
        let resource = resources
            .get_mut(endpoint)
            .and_then(|items| items.get_mut(&id))
            .and_then(Json::as_object_mut)
            .ok_or_else(|| Self::not_found("PUT", endpoint, id))?;
        merge_body(resource, body);
        Ok(parse_ids(Json::Object(resource.clone())))
    }

    async fn delete(&self, endpoint: &str, id: Id) -> Result<bool, TransportError> {
        self.record(Call::Delete {
            endpoint: endpoint.to_string(),
            id,
        });
        self.resources
            .borrow_mut()
            .get_mut(endpoint)
            .and_then(|items| items.remove(&id))
            .map(|_| true)
            .ok_or_else(|| Self::not_found("DELETE", endpoint, id))
    }
}
