//! Connection settings for a single MongoDB deployment.

/// Immutable settings used to build a connection URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,

    /// Replica set name, attached as the `replicaSet` URI option.
    pub replica_set: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            username: String::new(),
            password: String::new(),
            database: "test".to_string(),
            replica_set: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a credential-less config for `host:port/database`.
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            ..Default::default()
        }
    }

    /// Set username and password.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the replica set name.
    #[must_use]
    pub fn replica_set(mut self, name: impl Into<String>) -> Self {
        self.replica_set = Some(name.into());
        self
    }

    /// Credentials are embedded only when both parts are present.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}
