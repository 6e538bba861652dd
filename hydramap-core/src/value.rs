//! Property values held by records.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value as Json;

use crate::collection::EntityCollection;
use crate::record::Handle;

/// Declared type of a scalar property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Integer,
    Float,
    Boolean,
    String,
    DateTime,
    Blob,
    Array,
}

impl ScalarType {
    /// Resolves a declared type name, accepting the usual aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" | "integer" => Some(ScalarType::Integer),
            "float" | "double" => Some(ScalarType::Float),
            "bool" | "boolean" => Some(ScalarType::Boolean),
            "string" => Some(ScalarType::String),
            "date" | "datetime" => Some(ScalarType::DateTime),
            "blob" => Some(ScalarType::Blob),
            "array" => Some(ScalarType::Array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Boolean => "boolean",
            ScalarType::String => "string",
            ScalarType::DateTime => "datetime",
            ScalarType::Blob => "blob",
            ScalarType::Array => "array",
        }
    }

    /// Coerces a raw JSON value into this type.
    ///
    /// Returns `None` when the value cannot be represented.
    pub fn coerce(&self, raw: &Json) -> Option<Scalar> {
        match self {
            ScalarType::Integer => match raw {
                Json::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                    .map(Scalar::Int),
                Json::Bool(b) => Some(Scalar::Int(i64::from(*b))),
                Json::String(s) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .ok()
                        .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                        .map(Scalar::Int)
                }
                _ => None,
            },
            ScalarType::Float => match raw {
                Json::Number(n) => n.as_f64().map(Scalar::Float),
                Json::Bool(b) => Some(Scalar::Float(if *b { 1.0 } else { 0.0 })),
                Json::String(s) => s.trim().parse::<f64>().ok().map(Scalar::Float),
                _ => None,
            },
            ScalarType::Boolean => match raw {
                Json::Bool(b) => Some(Scalar::Bool(*b)),
                Json::Number(n) => Some(Scalar::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
                Json::String(s) => Some(Scalar::Bool(!(s.is_empty() || s == "0"))),
                _ => None,
            },
            ScalarType::String => match raw {
                Json::String(s) => Some(Scalar::Text(s.clone())),
                Json::Number(n) => Some(Scalar::Text(n.to_string())),
                Json::Bool(true) => Some(Scalar::Text("1".to_string())),
                Json::Bool(false) => Some(Scalar::Text(String::new())),
                _ => None,
            },
            ScalarType::DateTime => raw.as_str().and_then(parse_datetime).map(Scalar::DateTime),
            ScalarType::Blob | ScalarType::Array => Some(Scalar::Json(raw.clone())),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a date or date-time string and normalizes it to UTC.
///
/// Strings without an offset are taken to be UTC already.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A typed scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Json(Json),
}

impl Scalar {
    /// Renders the scalar the way it goes over the wire.
    ///
    /// Date-times use the W3C format with an explicit `+00:00` offset.
    pub fn to_json(&self) -> Json {
        match self {
            Scalar::Bool(b) => Json::Bool(*b),
            Scalar::Int(i) => Json::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Scalar::Text(s) => Json::String(s.clone()),
            Scalar::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::Secs, false)),
            Scalar::Json(v) => v.clone(),
        }
    }

    /// Emptiness in the loose sense used for "fuller" checks.
    pub fn is_empty(&self) -> bool {
        match self {
            Scalar::Bool(b) => !b,
            Scalar::Int(i) => *i == 0,
            Scalar::Float(f) => *f == 0.0,
            Scalar::Text(s) => s.is_empty() || s == "0",
            Scalar::DateTime(_) => false,
            Scalar::Json(v) => json_is_empty(v),
        }
    }

    /// String form used as a map key in collection projections.
    pub fn key_string(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            other => match other.to_json() {
                Json::String(s) => s,
                v => v.to_string(),
            },
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(dt: DateTime<Utc>) -> Self {
        Scalar::DateTime(dt)
    }
}

/// Emptiness of a raw JSON value.
pub fn json_is_empty(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::Bool(b) => !b,
        Json::Number(n) => n.as_f64() == Some(0.0),
        Json::String(s) => s.is_empty() || s == "0",
        Json::Array(a) => a.is_empty(),
        Json::Object(o) => o.is_empty(),
    }
}

/// Value stored in a record property.
///
/// An absent property is represented by the record not holding a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Ref(Handle),
    Collection(EntityCollection),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Ref(_) => "reference",
            Value::Collection(_) => "collection",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ref_handle(&self) -> Option<Handle> {
        match self {
            Value::Ref(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&EntityCollection> {
        match self {
            Value::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_collection_mut(&mut self) -> Option<&mut EntityCollection> {
        match self {
            Value::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Emptiness in the loose sense used for "fuller" checks.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_empty(),
            Value::Ref(_) => false,
            Value::Collection(c) => c.is_empty(),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

macro_rules! scalar_value_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Scalar(Scalar::from(v))
            }
        })*
    };
}

scalar_value_from!(bool, i64, f64, &str, String, DateTime<Utc>);

impl From<EntityCollection> for Value {
    fn from(c: EntityCollection) -> Self {
        Value::Collection(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_type_aliases() {
        assert_eq!(ScalarType::from_name("int"), Some(ScalarType::Integer));
        assert_eq!(ScalarType::from_name("double"), Some(ScalarType::Float));
        assert_eq!(ScalarType::from_name("bool"), Some(ScalarType::Boolean));
        assert_eq!(ScalarType::from_name("date"), Some(ScalarType::DateTime));
        assert_eq!(ScalarType::from_name("decimal"), None);
    }

    #[test]
    fn test_coerce_integer() {
        let t = ScalarType::Integer;
        assert_eq!(t.coerce(&json!(5)), Some(Scalar::Int(5)));
        assert_eq!(t.coerce(&json!("42")), Some(Scalar::Int(42)));
        assert_eq!(t.coerce(&json!(3.9)), Some(Scalar::Int(3)));
        assert_eq!(t.coerce(&json!(true)), Some(Scalar::Int(1)));
        assert_eq!(t.coerce(&json!("abc")), None);
    }

    #[test]
    fn test_coerce_boolean_and_string() {
        assert_eq!(ScalarType::Boolean.coerce(&json!("0")), Some(Scalar::Bool(false)));
        assert_eq!(ScalarType::Boolean.coerce(&json!(1)), Some(Scalar::Bool(true)));
        assert_eq!(
            ScalarType::String.coerce(&json!(12)),
            Some(Scalar::Text("12".into()))
        );
    }

    #[test]
    fn test_datetime_normalized_to_utc() {
        let parsed = ScalarType::DateTime
            .coerce(&json!("2024-03-01T12:00:00+02:00"))
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parsed, Scalar::DateTime(expected));
        assert_eq!(parsed.to_json(), json!("2024-03-01T10:00:00+00:00"));
    }

    #[test]
    fn test_datetime_without_offset_is_utc() {
        let dt = parse_datetime("2024-03-01 08:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());

        let date = parse_datetime("2024-03-01").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_emptiness() {
        assert!(json_is_empty(&json!(null)));
        assert!(json_is_empty(&json!("")));
        assert!(json_is_empty(&json!([])));
        assert!(!json_is_empty(&json!("x")));
        assert!(Scalar::Bool(false).is_empty());
        assert!(!Scalar::Int(7).is_empty());
    }
}
