//! Error types for schema loading, mapping and transport.

use thiserror::Error;

use crate::record::Handle;

/// Errors raised while building a schema from declarations.
///
/// These are always fatal: the declaration has to be fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("End point for entity is not valid: {0}")]
    MissingEndpoint(String),

    #[error("Entity type is not declared: {0}")]
    UnknownType(String),

    #[error("Unknown scalar type '{type_name}' for property {entity}::{property}")]
    UnknownScalarType {
        entity: String,
        property: String,
        type_name: String,
    },

    #[error("Failed to parse declarations: {0}")]
    Parse(String),
}

/// Errors raised while mapping raw data to records or records to payloads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("There is no setter for property '{property}' in entity {entity}")]
    NoSetter { entity: String, property: String },

    #[error("There is no getter, has or is accessor for property '{property}' in entity {entity}")]
    NoGetter { entity: String, property: String },

    #[error("Malformed link '{0}'")]
    InvalidLink(String),

    #[error("Value for {entity}::{property} is not a valid {expected}: {value}")]
    InvalidValue {
        entity: String,
        property: String,
        expected: String,
        value: String,
    },

    #[error("Property {entity}::{property} holds a {found} but is declared as {expected}")]
    KindMismatch {
        entity: String,
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown entity handle {0:?}")]
    UnknownHandle(Handle),
}

/// Errors raised by a transport.
///
/// Not-found is not an error: transports report it as `None` or an empty page.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {status} for {method} {url}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Expected {expected} content type but received '{received}'")]
    ContentType { expected: String, received: String },

    #[error("Not authorized: empty or expired access token")]
    Unauthorized,

    #[error("Malformed response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.to_string())
    }
}

/// Umbrella error returned by the repository facade.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
