//! Launching services.
//!
//! [`ServiceLauncher`] separates "how a service is started" from the ordering
//! and teardown logic in [`crate::ServiceSet`], so that logic can be tested with
//! in-memory fakes.
//!
//! ```text
//!   ServiceSet ──spawn──▶ ServiceLauncher ──▶ ManagedService
//!        │                    (trait)            (trait)
//!        └──────────await_ready──┘                  │
//!                                        OsLauncher / ProcessHandle
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qbridge_e2e_core::config::{E2eConfig, ServiceSpec, service_log_path};
use qbridge_e2e_core::error::SpawnError;
use qbridge_e2e_core::report::TeardownStep;

use crate::handle::ProcessHandle;
use crate::probe;

/// Default interval between readiness probes.
pub const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A started service that can be stopped.
///
/// `terminate` must be idempotent and must not fail: problems are reported in
/// the returned [`TeardownStep`].
pub trait ManagedService: Send {
    fn name(&self) -> &str;

    fn pid(&self) -> Option<u32>;

    fn process_group(&self) -> Option<i32>;

    fn terminate(&mut self) -> impl Future<Output = TeardownStep> + Send;
}

/// Starts services and waits for them to become ready.
///
/// # Implementations
///
/// - [`OsLauncher`]: spawns real processes in their own process groups
pub trait ServiceLauncher: Send + Sync {
    type Service: ManagedService;

    /// Start the service without waiting for readiness.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::Launch` or `SpawnError::LogFile` when the service
    /// could not be started at all.
    fn spawn(&self, spec: &ServiceSpec) -> Result<Self::Service, SpawnError>;

    /// Wait until `service` satisfies `spec.ready`.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::ExitedEarly` if the service died while waiting and
    /// `SpawnError::NotReady` on timeout.
    fn await_ready(
        &self,
        service: &mut Self::Service,
        spec: &ServiceSpec,
    ) -> impl Future<Output = Result<(), SpawnError>> + Send;
}

impl ManagedService for ProcessHandle {
    fn name(&self) -> &str {
        ProcessHandle::name(self)
    }

    fn pid(&self) -> Option<u32> {
        ProcessHandle::pid(self)
    }

    fn process_group(&self) -> Option<i32> {
        ProcessHandle::process_group(self)
    }

    async fn terminate(&mut self) -> TeardownStep {
        ProcessHandle::terminate(self).await
    }
}

/// Launches services as OS processes.
#[derive(Debug, Clone)]
pub struct OsLauncher {
    work_dir: PathBuf,
    log_dir: PathBuf,
    poll_interval: Duration,
}

impl OsLauncher {
    pub fn new(work_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            log_dir: log_dir.into(),
            poll_interval: DEFAULT_READY_POLL_INTERVAL,
        }
    }

    /// Launcher using `general.work_dir` and `general.log_dir`.
    pub fn from_config(config: &E2eConfig) -> Self {
        Self::new(&config.general.work_dir, &config.general.log_dir)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Log file a service's output is captured into.
    pub fn log_path(&self, service: &str) -> PathBuf {
        service_log_path(&self.log_dir, service)
    }
}

impl ServiceLauncher for OsLauncher {
    type Service = ProcessHandle;

    fn spawn(&self, spec: &ServiceSpec) -> Result<ProcessHandle, SpawnError> {
        ProcessHandle::spawn(spec, &self.work_dir, &self.log_path(&spec.name))
    }

    async fn await_ready(
        &self,
        service: &mut ProcessHandle,
        spec: &ServiceSpec,
    ) -> Result<(), SpawnError> {
        probe::await_ready(service, spec, self.poll_interval).await?;
        Ok(())
    }
}
