//! Database module exports.
//!
//! - `driver` - wire boundary traits and request types
//! - `mongo` - production driver over the `mongodb` crate
//! - `connection` - URI building, health checks and reconnection
//! - `identifier` - `_id` normalization
//! - `query`, `write`, `aggregate` - operation executors on a connection

mod aggregate;
mod connection;
mod driver;
mod identifier;
mod mongo;
mod query;
mod write;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::Command;
pub use connection::{build_uri, Connection};
pub use driver::{
    majority_concern, Driver, Namespace, QueryOptions, Session, Update, WRITE_CONCERN_TIMEOUT,
};
pub use identifier::{id_to_string, normalize_filter, stringify_id, ID_FIELD};
pub use mongo::{MongoDriver, MongoSession};
pub use query::{PaginationResult, DEFAULT_PAGE_SIZE};
pub use write::validate_documents;
