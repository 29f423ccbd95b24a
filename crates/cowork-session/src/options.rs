// ABOUTME: Connection parameters and session tunables.
// ABOUTME: Options load from TOML; SessionConfig holds heartbeat settings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::error::SessionError;

/// Default period between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Reason sent with a heartbeat when nobody asked for one since the last tick.
pub const DEFAULT_HEARTBEAT_REASON: &str = "heartbeat";

/// Connection parameters for a relay session.
///
/// Client name, session id, relay SAS and relay endpoint are validated before
/// any network action; the session token is only checked right before the
/// SSH layer needs it.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Name of the connecting client, reported with every heartbeat.
    pub client_name: String,
    /// Workspace session identifier.
    pub session_id: String,
    /// Token for the SSH session and the internal gRPC server.
    pub session_token: String,
    /// Relay shared-access signature.
    pub relay_sas: String,
    /// Relay endpoint URL (`sb://...`, `http://...`).
    pub relay_endpoint: String,
    /// Accepted host public keys (base64 wire blobs or OpenSSH lines).
    pub host_public_keys: Vec<String>,
    /// TLS configuration for the websocket transport. Uses the transport's
    /// default when unset.
    #[serde(skip)]
    pub tls_config: Option<Arc<rustls::ClientConfig>>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("client_name", &self.client_name)
            .field("session_id", &self.session_id)
            .field("session_token", &redact(&self.session_token))
            .field("relay_sas", &redact(&self.relay_sas))
            .field("relay_endpoint", &self.relay_endpoint)
            .field("host_public_keys", &self.host_public_keys.len())
            .field("tls_config", &self.tls_config.is_some())
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

/// Errors loading options from disk.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Options {
    /// Parse options from a TOML document. Missing fields are left empty and
    /// caught by validation when connecting.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Set the TLS configuration for the websocket transport.
    pub fn with_tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }
}

/// Tunables for a connected session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period between heartbeats.
    pub heartbeat_interval: Duration,
    /// Reason used when no keep-alive was requested since the last tick.
    pub default_heartbeat_reason: String,
    /// Post a keep-alive reason for every connection accepted on the
    /// internal tunnel.
    pub forward_keep_alive: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            default_heartbeat_reason: DEFAULT_HEARTBEAT_REASON.to_string(),
            forward_keep_alive: true,
        }
    }
}

impl SessionConfig {
    /// Set the heartbeat period.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the default heartbeat reason.
    pub fn with_default_heartbeat_reason(mut self, reason: impl Into<String>) -> Self {
        self.default_heartbeat_reason = reason.into();
        self
    }

    /// Check the tunables before any network action.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.heartbeat_interval.is_zero() {
            return Err(SessionError::InvalidConfig {
                field: "heartbeat_interval",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }

    /// Stop forwarded connections from counting as activity.
    pub fn without_forward_keep_alive(mut self) -> Self {
        self.forward_keep_alive = false;
        self
    }
}
