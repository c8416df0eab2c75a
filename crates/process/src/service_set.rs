//! Ordered start and reverse-order stop of the system under test.

use qbridge_e2e_core::config::ServiceSpec;
use qbridge_e2e_core::error::SpawnError;
use qbridge_e2e_core::report::{StepOutcome, TeardownReport, TeardownStep};

use crate::launcher::{ManagedService, ServiceLauncher};
use crate::registry::ProcessGroupRegistry;

/// The set of services started for one run.
///
/// Services are started in declaration order and stopped in reverse order.
/// A service is registered as soon as it is spawned, before its readiness is
/// awaited, so a partially started set is still fully torn down.
pub struct ServiceSet<L: ServiceLauncher> {
    launcher: L,
    registry: ProcessGroupRegistry,
    services: Vec<L::Service>,
}

impl<L: ServiceLauncher> ServiceSet<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            registry: ProcessGroupRegistry::new(),
            services: Vec::new(),
        }
    }

    /// Start every service in `specs` in order, waiting for each to become ready.
    ///
    /// Stops at the first failure; services started before it stay registered
    /// and are stopped by [`stop_all`](Self::stop_all).
    ///
    /// # Errors
    ///
    /// - `SpawnError::DuplicateName` if a name is already in the set
    /// - any launch or readiness error from the launcher
    pub async fn start_all(&mut self, specs: &[ServiceSpec]) -> Result<(), SpawnError> {
        for spec in specs {
            self.start(spec).await?;
        }
        tracing::info!(count = self.services.len(), "all services started");
        Ok(())
    }

    /// Start a single service and wait for readiness.
    pub async fn start(&mut self, spec: &ServiceSpec) -> Result<(), SpawnError> {
        if self.registry.contains(&spec.name) {
            return Err(SpawnError::DuplicateName(spec.name.clone()));
        }

        tracing::info!(service = %spec.name, command = %spec.command_line(), "starting service");
        let service = self.launcher.spawn(spec)?;
        self.registry
            .register(&spec.name, service.pid(), service.process_group())?;
        self.services.push(service);

        let Some(service) = self.services.last_mut() else {
            return Err(SpawnError::Launch {
                service: spec.name.clone(),
                reason: "service vanished after registration".to_owned(),
            });
        };
        self.launcher.await_ready(service, spec).await
    }

    /// Stop every registered service in reverse start order.
    ///
    /// Each service is stopped exactly once even if this is called repeatedly;
    /// later calls return an empty report. Failures are recorded, never raised.
    pub async fn stop_all(&mut self) -> TeardownReport {
        let mut report = TeardownReport::new();

        for tracked in self.registry.drain_for_shutdown() {
            let position = self.services.iter().position(|s| s.name() == tracked.name);
            let step = match position {
                Some(index) => {
                    let mut service = self.services.remove(index);
                    tracing::info!(service = %tracked, "stopping service");
                    service.terminate().await
                }
                None => TeardownStep::new(
                    tracked.name.clone(),
                    tracked.pid,
                    StepOutcome::Failed("no handle for registered service".to_owned()),
                ),
            };
            report.push(step);
        }

        if !report.is_empty() {
            tracing::info!(
                stopped = report.len(),
                failures = report.failures().count(),
                "service teardown finished"
            );
        }
        report
    }

    pub fn registry(&self) -> &ProcessGroupRegistry {
        &self.registry
    }

    pub fn service(&self, name: &str) -> Option<&L::Service> {
        self.services.iter().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
