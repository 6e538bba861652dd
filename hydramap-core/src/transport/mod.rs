//! Access to the Data API.
//!
//! The engine only needs a handful of calls: fetch one resource, fetch a
//! page of a collection, create, replace and delete. [`HttpTransport`]
//! talks JSON-LD/Hydra over HTTP; [`InMemoryTransport`] keeps everything in
//! process and records the calls it receives.

mod http;
mod memory;

pub use http::{Auth, HttpTransport};
pub use memory::{Call, InMemoryTransport};

use serde_json::{Map, Value as Json};

use crate::error::TransportError;
use crate::record::Id;

/// Query string pairs, in order.
pub type QueryParams = Vec<(String, String)>;

/// One page of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Json>,
    pub total_pages: u32,
}

impl Page {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_pages: 1,
        }
    }
}

/// Calls the repository makes against the Data API.
///
/// Returned bodies already have their `@id` links turned into numeric `id`
/// fields. Bodies sent with `post`/`put` are wire payloads (see
/// [`Payload::to_wire`](crate::payload::Payload::to_wire)).
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Fetches one resource; `None` when it does not exist.
    async fn get_by_id(&self, endpoint: &str, id: Id) -> Result<Option<Json>, TransportError>;

    /// Fetches one page (1-based); a missing collection is an empty page.
    async fn get_page(
        &self,
        endpoint: &str,
        page: u32,
        query: &[(String, String)],
    ) -> Result<Page, TransportError>;

    /// Fetches every page of a collection.
    async fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<Vec<Json>, TransportError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let result = self.get_page(endpoint, page, query).await?;
            items.extend(result.items);
            if page >= result.total_pages {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn post(&self, endpoint: &str, body: &Json) -> Result<Json, TransportError>;

    async fn put(&self, endpoint: &str, id: Id, body: &Json) -> Result<Json, TransportError>;

    async fn delete(&self, endpoint: &str, id: Id) -> Result<bool, TransportError>;
}

/// Adds a numeric `id` next to every `@id` link, recursively.
///
/// An `id` already present is kept.
pub fn parse_ids(input: Json) -> Json {
    match input {
        Json::Object(object) => {
            let mut result = Map::with_capacity(object.len() + 1);
            for (key, value) in object {
                if key == "@id" {
                    if let Some(id) = value.as_str().and_then(trailing_id) {
                        result.entry("id").or_insert(Json::from(id));
                    }
                    result.insert(key, value);
                } else if key == "id" {
                    result.insert(key, value);
                } else {
                    result.insert(key, parse_ids(value));
                }
            }
            Json::Object(result)
        }
        Json::Array(items) => Json::Array(items.into_iter().map(parse_ids).collect()),
        other => other,
    }
}

fn trailing_id(link: &str) -> Option<Id> {
    link.rsplit('/').next()?.parse().ok()
}

/// Reads a Hydra collection body.
///
/// The page count comes from `hydra:totalItems` and `hydra:itemsPerPage`;
/// without a total the member count is used.
pub fn parse_collection(body: Json) -> Page {
    let Json::Object(mut body) = body else {
        return Page::empty();
    };
    let members = match body.remove("hydra:member") {
        Some(Json::Array(members)) => members,
        _ => Vec::new(),
    };
    let total = body
        .get("hydra:totalItems")
        .and_then(Json::as_u64)
        .unwrap_or(members.len() as u64);
    if total == 0 {
        return Page::empty();
    }

    let per_page = body
        .get("hydra:itemsPerPage")
        .and_then(Json::as_u64)
        .filter(|n| *n > 0);
    let total_pages = match per_page {
        Some(per_page) => total.div_ceil(per_page).max(1) as u32,
        None => 1,
    };

    Page {
        items: members.into_iter().map(parse_ids).collect(),
        total_pages,
    }
}
