//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod resources;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use campus_client::{CampusClient, ClientEvent, FileStorage, SessionStore};
use campus_config::{CampusConfig, LoadedConfig};
use tokio::sync::mpsc;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration (layers plus CLI overrides).
    pub config: CampusConfig,
    /// Discovery result, for `config show`.
    pub loaded: LoadedConfig,
    /// User config directory, if one could be determined.
    pub config_dir: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Where clients report session expiry and failed calls.
    pub events: mpsc::UnboundedSender<ClientEvent>,
}

impl Context {
    /// Where the session is persisted.
    pub fn session_file(&self) -> Result<PathBuf> {
        campus_config::session_file_path(&self.config, self.config_dir.as_deref())
            .context("Could not determine config directory; pass --config-dir")
    }

    /// Build a client over the persisted session.
    pub fn client(&self) -> Result<CampusClient> {
        let session = SessionStore::new(Arc::new(FileStorage::new(self.session_file()?)));
        session.init().context("Failed to read the saved session")?;

        let mut builder = CampusClient::builder()
            .base_url(self.config.server_url())
            .timeout(self.config.timeout())
            .session(Arc::new(session))
            .event_sink(Arc::new(self.events.clone()));
        if let Some(agent) = self.config.user_agent() {
            builder = builder.user_agent(agent);
        }
        Ok(builder.build()?)
    }

    /// Print a value as pretty JSON.
    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
