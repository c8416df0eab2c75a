//! qbridge E2E runner library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `qbridge-e2e` is used as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod orchestrator;
pub mod output;

use anyhow::Result;

use qbridge_e2e_core::config::{DEFAULT_CONFIG_PATH, E2eConfig};

use crate::cli::E2eCli;

/// Effective configuration plus messages that could not be logged yet.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub config: E2eConfig,
    /// Ignored environment values, to be logged once tracing is initialized.
    pub warnings: Vec<String>,
}

/// Resolve the effective configuration for `cli`.
///
/// Precedence: flags, then `QBRIDGE_E2E_*` environment variables, then the
/// file, then defaults. An explicit `--config` path must exist; the default
/// path may be absent. Validation runs once, after every override.
pub async fn resolve_config(cli: &E2eCli) -> Result<ResolvedConfig> {
    let mut config = match &cli.config {
        Some(path) => E2eConfig::from_file(path).await,
        None => E2eConfig::from_file_or_default(DEFAULT_CONFIG_PATH).await,
    }
    .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;

    let warnings = config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(ResolvedConfig { config, warnings })
}
