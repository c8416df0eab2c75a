//! CLI argument definitions for qbridge-e2e.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use qbridge_e2e_core::config::E2eConfig;

/// End-to-end test runner for the qbridge pipeline.
///
/// Starts the broker, launches gateway, buffer and transport, runs the
/// scenario suite and always tears everything down again.
#[derive(Parser, Debug)]
#[command(name = "qbridge-e2e")]
#[command(version, about, long_about = None)]
pub struct E2eCli {
    /// Path to the TOML configuration file.
    ///
    /// When omitted, `qbridge-e2e.toml` is used if it exists, otherwise the
    /// built-in defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Format of the final run report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Validate the configuration, print it and exit without running.
    #[arg(long)]
    pub validate: bool,
}

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl E2eCli {
    /// Apply flag overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut E2eConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
