use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use qbridge_e2e_runner::cli::{E2eCli, OutputFormat};
use qbridge_e2e_runner::orchestrator::{SystemOrchestrator, shutdown_signal};
use qbridge_e2e_runner::output::{OutputWriter, summary_line};
use qbridge_e2e_runner::{ResolvedConfig, logging, resolve_config};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("qbridge-e2e: {e:#}");
            eprintln!("E2E Test Run: FAILED");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<u8> {
    let cli = E2eCli::parse();
    let ResolvedConfig { config, warnings } = resolve_config(&cli).await?;

    if cli.validate {
        let rendered = toml::to_string_pretty(&config)
            .map_err(|e| anyhow::anyhow!("failed to render config: {}", e))?;
        println!("{rendered}");
        for message in &warnings {
            eprintln!("warning: {message}");
        }
        eprintln!("configuration is valid");
        return Ok(0);
    }

    logging::init_tracing(&config.general)?;
    for message in &warnings {
        tracing::warn!("{message}");
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "qbridge-e2e starting");

    let orchestrator = SystemOrchestrator::build_from_config(config)?;
    let report = orchestrator.run_until(shutdown_signal()).await;

    OutputWriter::new(cli.output).render(&report)?;
    if cli.output == OutputFormat::Json {
        eprintln!("{}", summary_line(&report));
    }

    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}
