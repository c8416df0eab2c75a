//! Run orchestration: setup, scenarios and guaranteed teardown.
//!
//! The [`Orchestrator`] walks the run through its phases and produces a
//! [`RunReport`].
//!
//! # Forward phases
//!
//! 1. Dependency up (compose up, broker answers PING)
//! 2. State cleared (broker stream deleted, failure only warned about)
//! 3. Services up (gateway, buffer, transport, each awaited until ready)
//! 4. Scenarios run (every scenario runs, failures are verdicts)
//!
//! # Teardown (always)
//!
//! 1. Services stopped in reverse start order
//! 2. Dependency stopped (compose down)
//!
//! A setup failure or a shutdown signal ends the forward phases early; the
//! teardown still runs exactly once.

use std::future::Future;
use std::path::Path;

use anyhow::Result;

use qbridge_e2e_core::config::E2eConfig;
use qbridge_e2e_core::error::E2eError;
use qbridge_e2e_core::phase::Phase;
use qbridge_e2e_core::report::{
    RunReport, ScenarioResult, SetupFailure, StepOutcome, TeardownReport, TeardownStep,
};
use qbridge_e2e_dependency::{
    Broker, ClearOutcome, ComposeRunner, DependencyEnvironment, DockerCompose, RedisBroker,
};
use qbridge_e2e_process::{OsLauncher, ServiceLauncher, ServiceSet};
use qbridge_e2e_scenarios::{ScenarioRunner, SystemEndpoints};

/// Resource name used for the dependency step of the teardown report.
pub const DEPENDENCY_RESOURCE: &str = "dependency";

/// Orchestrator wired to the real system: docker compose, redis and OS processes.
pub type SystemOrchestrator = Orchestrator<DockerCompose, RedisBroker, OsLauncher>;

/// Drives one E2E run.
pub struct Orchestrator<C, B, L: ServiceLauncher> {
    config: E2eConfig,
    dependency: DependencyEnvironment<C, B>,
    services: ServiceSet<L>,
    scenarios: ScenarioRunner,
    endpoints: SystemEndpoints,
    phase: Phase,
    warnings: Vec<String>,
}

impl SystemOrchestrator {
    /// Load configuration from `config_path` and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = E2eConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: E2eConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let compose =
            DockerCompose::new(&config.compose).with_work_dir(&config.general.work_dir);
        let broker = RedisBroker::from_config(&config.broker)
            .map_err(|e| anyhow::anyhow!("failed to build broker client: {}", e))?;
        let launcher = OsLauncher::from_config(&config);

        tracing::debug!(
            services = config.services.len(),
            compose_file = %config.compose.file.display(),
            broker = %broker.endpoint(),
            "orchestrator initialized"
        );
        Ok(Self::from_parts(
            config,
            compose,
            broker,
            launcher,
            ScenarioRunner::standard(),
        ))
    }
}

impl<C, B, L> Orchestrator<C, B, L>
where
    C: ComposeRunner,
    B: Broker,
    L: ServiceLauncher,
{
    /// Assemble an orchestrator from its collaborators.
    pub fn from_parts(
        config: E2eConfig,
        compose: C,
        broker: B,
        launcher: L,
        scenarios: ScenarioRunner,
    ) -> Self {
        let endpoints = SystemEndpoints::from_config(&config);
        let dependency = DependencyEnvironment::new(compose, broker, config.broker.clone());
        Self {
            config,
            dependency,
            services: ServiceSet::new(launcher),
            scenarios,
            endpoints,
            phase: Phase::Init,
            warnings: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run to completion without an external shutdown trigger.
    pub async fn run(self) -> RunReport {
        self.run_until(std::future::pending::<&'static str>()).await
    }

    /// Run the forward phases until they finish, fail, or `shutdown` resolves.
    ///
    /// `shutdown` yields the name of what interrupted the run (e.g. `"SIGINT"`).
    /// Teardown always runs afterwards; no error escapes this method.
    pub async fn run_until<F>(mut self, shutdown: F) -> RunReport
    where
        F: Future<Output = &'static str>,
    {
        tracing::info!(
            services = self.config.services.len(),
            scenarios = self.scenarios.len(),
            "E2E run starting"
        );

        let mut results = Vec::new();
        let interrupted = tokio::select! {
            outcome = self.forward(&mut results) => outcome.err().map(|e| e.to_string()),
            signal = shutdown => Some(format!("interrupted by {signal}")),
        };

        let setup_failure = interrupted.map(|message| {
            tracing::error!(phase = %self.phase, error = %message, "run aborted, tearing down");
            SetupFailure {
                reached: self.phase,
                message,
            }
        });

        let teardown = self.teardown().await;
        let report = RunReport::new(results, self.scenarios.len(), setup_failure, teardown)
            .with_warnings(std::mem::take(&mut self.warnings));
        self.advance(Phase::Reported);

        tracing::info!(
            passed = report.passed(),
            exit_code = report.exit_code(),
            warnings = report.warnings().len(),
            "E2E run finished"
        );
        report
    }

    async fn forward(&mut self, results: &mut Vec<ScenarioResult>) -> Result<(), E2eError> {
        self.dependency.start().await?;
        self.advance(Phase::DependencyUp);

        if let ClearOutcome::Failed(reason) = self.dependency.clear_configured_state().await {
            self.warnings.push(format!(
                "could not clear stream '{}': {}",
                self.config.broker.stream_name, reason
            ));
        }
        self.advance(Phase::StateCleared);

        self.services.start_all(&self.config.services).await?;
        self.advance(Phase::ServicesUp);

        self.scenarios.run_into(&self.endpoints, results).await;
        self.advance(Phase::ScenariosRun);
        Ok(())
    }

    async fn teardown(&mut self) -> TeardownReport {
        tracing::info!("tearing down");
        let mut report = self.services.stop_all().await;

        let outcome = match self.dependency.stop().await {
            Ok(()) => StepOutcome::Stopped,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        report.push(TeardownStep::new(DEPENDENCY_RESOURCE, None, outcome));

        self.advance(Phase::TornDown);
        report
    }

    fn advance(&mut self, to: Phase) {
        if self.phase.can_transition_to(to) {
            tracing::info!(from = %self.phase, to = %to, "phase transition");
            self.phase = to;
        } else {
            tracing::warn!(from = %self.phase, to = %to, "ignoring out-of-order phase transition");
        }
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
///
/// If the handlers cannot be installed the run is never interrupted.
#[cfg(unix)]
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let handlers = signal(SignalKind::terminate())
        .and_then(|term| signal(SignalKind::interrupt()).map(|int| (term, int)));
    match handlers {
        Ok((mut sigterm, mut sigint)) => tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        },
        Err(e) => {
            tracing::warn!(error = %e, "failed to install signal handlers");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "CTRL-C",
        Err(e) => {
            tracing::warn!(error = %e, "failed to install ctrl-c handler");
            std::future::pending().await
        }
    }
}
