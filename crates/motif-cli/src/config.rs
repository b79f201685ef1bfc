//! Configuration loading for the CLI
//!
//! Defaults, then the `--config` TOML file when given, then environment.

use crate::error::{CliError, Result};
use anyhow::Context;
use motif_db::{MotifConfig, MotifSession};
use std::path::Path;
use tracing::debug;

/// Resolve the effective configuration
pub fn load(path: Option<&Path>) -> Result<MotifConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.is_file() {
                return Err(CliError::config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            MotifConfig::from_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?
        },
        None => MotifConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    debug!(db_root = %config.db_root.display(), mode = %config.mode, "Configuration loaded");
    Ok(config)
}

/// Load the configuration and bootstrap a session from it
pub async fn open_session(path: Option<&Path>) -> Result<MotifSession> {
    let config = load(path)?;
    Ok(MotifSession::bootstrap(config).await?)
}
