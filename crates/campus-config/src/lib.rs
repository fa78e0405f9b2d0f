//! Configuration for the Campus console.
//!
//! Provides TOML-based configuration with:
//! - Backend connection settings (`[server]`)
//! - Session persistence location (`[session]`)
//! - Config file layering (user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    load_config, load_config_file, load_config_with_options, save_config, session_file_path,
    xdg_config_dir, xdg_config_path, ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use types::*;
