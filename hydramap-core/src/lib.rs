//! Hydramap Core Library
//!
//! Maps JSON-LD/Hydra Data API resources to a graph of records and back:
//! schema loading, identity map, change tracking and minimal write payloads.

pub mod collection;
pub mod declaration;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod payload;
pub mod record;
pub mod repository;
pub mod schema;
pub mod snapshot;
pub mod transport;
pub mod value;

pub use collection::EntityCollection;
pub use declaration::{Accessors, Declarations, EntityDecl, PropertyDecl};
pub use error::{Error, MappingError, Result, SchemaError, TransportError};
pub use identity::IdentityMap;
pub use mapper::Mapper;
pub use payload::{Payload, PayloadOutcome, PayloadValue};
pub use record::{EntityArena, EntityKey, Handle, Id, Record};
pub use repository::{Direction, EntityManager, Query, Repository};
pub use schema::{Loader, PropertyKind, PropertySchema, Reader, Relation, Schema};
pub use snapshot::{Baseline, Snapshot, SnapshotStore};
pub use transport::{Auth, HttpTransport, InMemoryTransport, Page, Transport};
pub use value::{Scalar, ScalarType, Value};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
