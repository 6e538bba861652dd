//! Outbound write payloads.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use crate::record::{link, Id};

/// Changed-fields payload produced by the outbound mapper.
///
/// The endpoint is carried only to build links and is never sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub endpoint: String,
    pub id: Option<Id>,
    pub fields: BTreeMap<String, PayloadValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// Explicitly unset a property that had a value.
    Null,
    Json(Json),
    /// `/endpoint/id` reference.
    Link(String),
    Object(Payload),
    Array(Vec<PayloadValue>),
}

/// Result of diffing an entity against its baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadOutcome {
    /// Nothing to write.
    Unchanged,
    Changed(Payload),
}

impl Payload {
    pub fn new(endpoint: impl Into<String>, id: Option<Id>) -> Self {
        Self {
            endpoint: endpoint.into(),
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PayloadValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&PayloadValue> {
        self.fields.get(name)
    }

    /// True when the payload carries nothing besides id and endpoint.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Renders the body sent to the Data API.
    ///
    /// Every object with an id also gets its `@id` link so the server can
    /// resolve it; endpoints are dropped.
    pub fn to_wire(&self) -> Json {
        let mut object = Map::new();
        if let Some(id) = self.id {
            object.insert("@id".to_string(), Json::String(link(&self.endpoint, id)));
            object.insert("id".to_string(), Json::from(id));
        }
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_wire());
        }
        Json::Object(object)
    }
}

impl PayloadValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PayloadValue::Null => "null",
            PayloadValue::Json(_) => "scalar",
            PayloadValue::Link(_) => "link",
            PayloadValue::Object(_) => "object",
            PayloadValue::Array(_) => "array",
        }
    }

    pub fn to_wire(&self) -> Json {
        match self {
            PayloadValue::Null => Json::Null,
            PayloadValue::Json(v) => v.clone(),
            PayloadValue::Link(l) => Json::String(l.clone()),
            PayloadValue::Object(p) => p.to_wire(),
            PayloadValue::Array(items) => Json::Array(items.iter().map(Self::to_wire).collect()),
        }
    }
}

impl PayloadOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, PayloadOutcome::Unchanged)
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            PayloadOutcome::Unchanged => None,
            PayloadOutcome::Changed(p) => Some(p),
        }
    }

    pub fn into_payload(self) -> Option<Payload> {
        match self {
            PayloadOutcome::Unchanged => None,
            PayloadOutcome::Changed(p) => Some(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_injects_ids_and_drops_endpoint() {
        let mut owner = Payload::new("users", Some(2));
        owner.insert("name", PayloadValue::Json(json!("Ann")));

        let mut draft = Payload::new("notes", None);
        draft.insert("text", PayloadValue::Json(json!("hi")));

        let mut payload = Payload::new("resources", Some(10));
        payload.insert("owner", PayloadValue::Object(owner));
        payload.insert("parent", PayloadValue::Link("/resources/3".into()));
        payload.insert("notes", PayloadValue::Array(vec![PayloadValue::Object(draft)]));
        payload.insert("phone", PayloadValue::Null);

        assert_eq!(
            payload.to_wire(),
            json!({
                "@id": "/resources/10",
                "id": 10,
                "owner": {"@id": "/users/2", "id": 2, "name": "Ann"},
                "parent": "/resources/3",
                "notes": [{"text": "hi"}],
                "phone": null
            })
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let payload = Payload::new("users", Some(1));
        assert!(payload.is_empty());
        assert!(PayloadOutcome::Unchanged.is_unchanged());
        assert_eq!(
            PayloadOutcome::Changed(payload.clone()).into_payload(),
            Some(payload)
        );
    }
}
