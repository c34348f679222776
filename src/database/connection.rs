//! A single logical connection and its lifecycle.
//!
//! A [`Connection`] is built from a [`ConnectionConfig`], verified with a
//! ping before every hand-out, and rebuilt in place when the ping hits a
//! connectivity failure. A connection whose session was discarded is never
//! used again until it has been rebuilt.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use url::Url;

use super::driver::{Driver, Namespace, Session};
use crate::config::{ConnectionConfig, ReconnectPolicy};
use crate::error::{MongoError, Result};

const SCHEME: &str = "mongodb";

/// Build the connection URI for `config`.
///
/// `mongodb://[user:pass@]host:port/database[?replicaSet=name]`. Credentials
/// are embedded only when both username and password are set, and are
/// percent-encoded.
pub fn build_uri(config: &ConnectionConfig) -> Result<String> {
    let base = format!("{SCHEME}://{}:{}/{}", config.host, config.port, config.database);
    let mut uri = Url::parse(&base)
        .map_err(|e| MongoError::Runtime(format!("invalid mongo uri '{base}': {e}")))?;

    if config.has_credentials() {
        uri.set_username(&config.username)
            .and_then(|()| uri.set_password(Some(&config.password)))
            .map_err(|()| MongoError::Argument("mongo credentials rejected".to_string()))?;
    }

    if let Some(replica_set) = &config.replica_set {
        uri.query_pairs_mut().append_pair("replicaSet", replica_set);
    }

    Ok(uri.into())
}

/// A pooled connection: an open session plus what it takes to rebuild it.
pub struct Connection<D: Driver> {
    id: u64,
    driver: Arc<D>,
    config: Arc<ConnectionConfig>,
    policy: ReconnectPolicy,
    session: Option<D::Session>,
}

impl<D: Driver> Connection<D> {
    /// Open a new connection. No round trip happens here.
    pub async fn create(
        id: u64,
        driver: Arc<D>,
        config: Arc<ConnectionConfig>,
        policy: ReconnectPolicy,
    ) -> Result<Self> {
        let session = open_session(driver.as_ref(), &config).await?;
        debug!(connection = id, "Opened mongo connection");

        Ok(Self {
            id,
            driver,
            config,
            policy,
            session: Some(session),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Whether the connection has a live session.
    pub fn is_usable(&self) -> bool {
        self.session.is_some()
    }

    /// Namespace for `collection` in the configured database.
    pub fn namespace(&self, collection: &str) -> Namespace {
        Namespace::new(self.config.database.clone(), collection)
    }

    pub(crate) fn session(&self) -> Result<&D::Session> {
        self.session.as_ref().ok_or_else(|| {
            MongoError::Connectivity(format!("connection {} was discarded", self.id))
        })
    }

    /// Drop the session. The next health check rebuilds it.
    pub(crate) fn discard(&mut self) {
        if self.session.take().is_some() {
            warn!(connection = self.id, "Discarded mongo connection");
        }
    }

    /// Discard the session when `result` failed with a connectivity error.
    pub(crate) fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result
            && err.is_recoverable()
        {
            self.discard();
        }
        result
    }

    /// Ping the configured database.
    ///
    /// Failures go through [`Connection::handle`], so `Ok` means the
    /// connection is usable: either the ping succeeded or the connection
    /// was rebuilt.
    pub async fn check(&mut self) -> Result<()> {
        let outcome = match &self.session {
            Some(session) => session.ping(&self.config.database).await,
            None => Err(MongoError::Connectivity(format!(
                "connection {} has no session",
                self.id
            ))),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => self.handle(err).await,
        }
    }

    /// Classify a failure and recover from it when possible.
    ///
    /// Connectivity failures rebuild the session up to
    /// `policy.max_attempts` times with exponential backoff and fail with
    /// [`MongoError::Connectivity`] once attempts are exhausted. Argument,
    /// authentication and runtime failures are returned as-is; anything
    /// else becomes [`MongoError::Unexpected`].
    pub async fn handle(&mut self, err: MongoError) -> Result<()> {
        match err {
            MongoError::Argument(_) | MongoError::Authentication(_) | MongoError::Runtime(_) => {
                Err(err)
            }
            MongoError::Connectivity(reason) => {
                warn!(connection = self.id, %reason, "Mongo connectivity lost, reconnecting");
                self.session = None;
                self.reconnect(&reason).await
            }
            MongoError::Unexpected(_) => Err(err),
            other => Err(MongoError::Unexpected(other.to_string())),
        }
    }

    async fn reconnect(&mut self, reason: &str) -> Result<()> {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            match open_session(self.driver.as_ref(), &self.config).await {
                Ok(session) => {
                    self.session = Some(session);
                    info!(connection = self.id, attempt, "Mongo connection rebuilt");
                    return Ok(());
                }
                Err(e) => {
                    error!(connection = self.id, attempt, error = %e, "Mongo reconnect attempt failed");
                    let delay = self.policy.backoff(attempt);
                    if attempt < max_attempts && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(MongoError::Connectivity(format!(
            "gave up after {max_attempts} reconnect attempts: {reason}"
        )))
    }
}

async fn open_session<D: Driver>(driver: &D, config: &ConnectionConfig) -> Result<D::Session> {
    let uri = build_uri(config)?;
    driver.connect(&uri).await
}

impl<D: Driver> std::fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("database", &self.config.database)
            .field("usable", &self.is_usable())
            .finish()
    }
}
