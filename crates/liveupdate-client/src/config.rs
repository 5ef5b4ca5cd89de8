//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Well-known endpoint path for the live update channel.
pub const DEFAULT_ENDPOINT_PATH: &str = "/api/session/liveupdate";

/// Configuration for a [`crate::LiveUpdateClient`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host, optionally with a port (e.g. `"director:8080"`).
    pub host: String,
    /// Path of the live update endpoint on the host.
    pub endpoint_path: String,
}

impl ClientConfig {
    /// Create a configuration for the given host.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingHost`] when `host` is empty; a client
    /// cannot be constructed without a server address.
    pub fn new(host: impl Into<String>) -> Result<Self, ConfigError> {
        let host = host.into();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        Ok(Self {
            host,
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
        })
    }

    /// Create a configuration from the environment.
    ///
    /// Reads `LIVEUPDATE_HOST` and, optionally, `LIVEUPDATE_ENDPOINT`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingHost`] when `LIVEUPDATE_HOST` is unset
    /// or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) against an arbitrary variable source.
    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("LIVEUPDATE_HOST").unwrap_or_default();
        let mut config = Self::new(host)?;
        if let Some(path) = lookup("LIVEUPDATE_ENDPOINT") {
            if !path.is_empty() {
                config.endpoint_path = path;
            }
        }
        Ok(config)
    }

    /// Override the endpoint path.
    #[must_use]
    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    /// The WebSocket URL of the live update endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}{}", self.host, self.endpoint_path)
    }
}
