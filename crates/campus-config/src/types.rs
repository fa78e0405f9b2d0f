//! Configuration types.
//!
//! Every field is optional so that a layer only overrides what it names.
//! Defaults are applied by the accessor methods, never at parse time.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Backend URL used when no layer sets one.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Request timeout used when no layer sets one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampusConfig {
    /// Backend connection settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// Session persistence settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,
}

impl CampusConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: CampusConfig) {
        if let Some(server) = other.server {
            self.server.get_or_insert_with(ServerConfig::default).merge(server);
        }
        if let Some(session) = other.session {
            self.session.get_or_insert_with(SessionConfig::default).merge(session);
        }
    }

    /// Backend base URL.
    pub fn server_url(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.url.as_deref())
            .unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        let secs = self
            .server
            .as_ref()
            .and_then(|s| s.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// User agent override, if any.
    pub fn user_agent(&self) -> Option<&str> {
        self.server.as_ref().and_then(|s| s.user_agent.as_deref())
    }

    /// Explicit session file, if configured.
    pub fn session_file(&self) -> Option<&PathBuf> {
        self.session.as_ref().and_then(|s| s.file.as_ref())
    }

    /// Override the backend URL (CLI flag or environment).
    pub fn set_server_url(&mut self, url: impl Into<String>) {
        self.server.get_or_insert_with(ServerConfig::default).url = Some(url.into());
    }

    /// Reject values the client cannot use.
    pub fn validate(&self) -> Result<()> {
        let url = self.server_url();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "server.url".to_string(),
                reason: format!("'{url}' must start with http:// or https://"),
            });
        }
        if self.server.as_ref().and_then(|s| s.timeout_secs) == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[server]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backend base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// User agent sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ServerConfig {
    fn merge(&mut self, other: ServerConfig) {
        if other.url.is_some() {
            self.url = other.url;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
    }
}

/// `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the session is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl SessionConfig {
    fn merge(&mut self, other: SessionConfig) {
        if other.file.is_some() {
            self.file = other.file;
        }
    }
}
