//! Error types for pooled MongoDB operations.
//!
//! Every failure that leaves the crate is a [`MongoError`]. Driver errors are
//! classified once, at the wire boundary, so the reconnect policy and the
//! facade only ever match on these variants.

use mongodb::error::ErrorKind;
use thiserror::Error;

/// Server error code for a failed authentication handshake.
const AUTHENTICATION_FAILED: i32 = 18;

/// Classified failure of a connection or operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MongoError {
    /// Bad connection or configuration arguments. Never retried.
    #[error("mongo argument error: {0}")]
    Argument(String),

    /// Credentials were rejected by the server. Never retried.
    #[error("mongo authentication failed: {0}")]
    Authentication(String),

    /// Transient network failure (unreachable host, timeout, pool cleared).
    #[error("mongo connectivity error: {0}")]
    Connectivity(String),

    /// Driver-level runtime fault (command failure, write concern timeout).
    #[error("mongo runtime error: {0}")]
    Runtime(String),

    /// Malformed caller input, rejected before any I/O.
    #[error("validation error: {0}")]
    Validation(String),

    /// Anything the classifier does not recognise.
    #[error("mongo unexpected error: {0}")]
    Unexpected(String),

    /// No connection became available within the acquire timeout.
    #[error("timed out acquiring a connection from pool '{0}'")]
    PoolTimeout(String),

    /// The pool was closed while waiting for a connection.
    #[error("pool '{0}' is closed")]
    PoolClosed(String),
}

impl MongoError {
    /// Whether rebuilding the connection may recover from this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl From<mongodb::error::Error> for MongoError {
    fn from(err: mongodb::error::Error) -> Self {
        let message = err.to_string();
        match err.kind.as_ref() {
            ErrorKind::InvalidArgument { .. } => Self::Argument(message),
            ErrorKind::Authentication { .. } => Self::Authentication(message),
            ErrorKind::Command(command) if command.code == AUTHENTICATION_FAILED => {
                Self::Authentication(message)
            }
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. } => Self::Connectivity(message),
            ErrorKind::Command(_)
            | ErrorKind::Write(_)
            | ErrorKind::InsertMany(_)
            | ErrorKind::BsonDeserialization(_)
            | ErrorKind::BsonSerialization(_)
            | ErrorKind::InvalidResponse { .. }
            | ErrorKind::Internal { .. } => Self::Runtime(message),
            _ => Self::Unexpected(message),
        }
    }
}

impl From<mongodb::bson::oid::Error> for MongoError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        Self::Validation(format!("invalid object id: {err}"))
    }
}

impl From<mongodb::bson::de::Error> for MongoError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MongoError>;
