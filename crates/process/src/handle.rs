//! A single spawned service process.
//!
//! [`ProcessHandle`] owns the child process, the write end of its log file and
//! its lifecycle state. The child is placed in a new process group so that
//! helper processes it forks are signalled together with it.
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted --spawn--> Running --terminate--> Stopped
//!                          |
//!                          +--exited on its own / unkillable--> Failed
//! ```

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

use qbridge_e2e_core::config::ServiceSpec;
use qbridge_e2e_core::error::{SpawnError, TeardownError};
use qbridge_e2e_core::report::{StepOutcome, TeardownStep};

/// Lifecycle state of a [`ProcessHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Stopped,
    Failed,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Signals understood by [`signal_group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Terminate,
    Kill,
}

/// Handle to one externally spawned service process.
pub struct ProcessHandle {
    name: String,
    child: Child,
    pid: Option<u32>,
    pgid: Option<i32>,
    log_path: PathBuf,
    log_sink: Option<File>,
    state: ProcessState,
    stop_timeout: Duration,
}

impl ProcessHandle {
    /// Launch `spec` in `work_dir` with stdout and stderr redirected into `log_path`.
    ///
    /// The log file is truncated. On unix the child becomes the leader of a new
    /// process group. Readiness is not awaited here; see [`crate::probe`].
    ///
    /// # Errors
    ///
    /// - `SpawnError::LogFile` if the log file cannot be created
    /// - `SpawnError::Launch` if the executable cannot be started
    pub fn spawn(spec: &ServiceSpec, work_dir: &Path, log_path: &Path) -> Result<Self, SpawnError> {
        let log_error = |e: std::io::Error| SpawnError::LogFile {
            path: log_path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(log_error)?;
        }
        let log_sink = File::create(log_path).map_err(log_error)?;
        let stdout = log_sink.try_clone().map_err(log_error)?;
        let stderr = log_sink.try_clone().map_err(log_error)?;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| SpawnError::Launch {
            service: spec.name.clone(),
            reason: format!("{}: {}", spec.command_line(), e),
        })?;

        let pid = child.id();
        // process_group(0) makes the group id equal to the child's pid
        let pgid = if cfg!(unix) {
            pid.and_then(|p| i32::try_from(p).ok())
        } else {
            None
        };

        tracing::info!(
            service = %spec.name,
            pid = ?pid,
            command = %spec.command_line(),
            log = %log_path.display(),
            "service process spawned"
        );

        Ok(Self {
            name: spec.name.clone(),
            child,
            pid,
            pgid,
            log_path: log_path.to_path_buf(),
            log_sink: Some(log_sink),
            state: ProcessState::Running,
            stop_timeout: spec.stop_timeout(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Process-group id, equal to the pid on unix.
    pub fn process_group(&self) -> Option<i32> {
        self.pgid
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether the log sink is still open.
    pub fn log_open(&self) -> bool {
        self.log_sink.is_some()
    }

    /// Non-blocking check for an exit status.
    ///
    /// Returns `Some(status)` once the process has exited; the handle moves to
    /// `Failed` because a service is not expected to exit on its own.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                if self.state == ProcessState::Running {
                    tracing::warn!(service = %self.name, %status, "service exited on its own");
                    self.state = ProcessState::Failed;
                }
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(service = %self.name, error = %e, "try_wait failed");
                None
            }
        }
    }

    /// Stop the process group and reap the process.
    ///
    /// Sends SIGTERM to the whole group, waits up to the service's stop timeout,
    /// then escalates to SIGKILL. Never fails: the outcome is returned as a
    /// [`TeardownStep`]. The log sink is closed on every path. Calling this on an
    /// already stopped handle is a no-op reported as `AlreadyStopped`.
    pub async fn terminate(&mut self) -> TeardownStep {
        let outcome = self.terminate_inner().await;
        self.log_sink = None;

        match &outcome {
            StepOutcome::Failed(reason) => {
                tracing::error!(service = %self.name, reason = %reason, "failed to stop service");
            }
            StepOutcome::AlreadyStopped => {
                tracing::info!(service = %self.name, "service was already stopped");
            }
            StepOutcome::Stopped | StepOutcome::Killed => {
                tracing::info!(service = %self.name, outcome = ?outcome, "service stopped");
            }
        }

        TeardownStep::new(self.name.clone(), self.pid, outcome)
    }

    async fn terminate_inner(&mut self) -> StepOutcome {
        match self.state {
            ProcessState::Running => {}
            ProcessState::NotStarted | ProcessState::Stopped | ProcessState::Failed => {
                // An exited process may still need reaping
                let _ = self.child.try_wait();
                return StepOutcome::AlreadyStopped;
            }
        }

        if self.poll_exit().is_some() {
            return StepOutcome::AlreadyStopped;
        }

        if let Err(e) = self.send(StopSignal::Terminate) {
            // The group may have vanished between try_wait and kill; fall back
            // to the direct child so it is still reaped below.
            tracing::warn!(service = %self.name, error = %e, "SIGTERM to process group failed");
            let _ = self.child.start_kill();
        }

        let started = tokio::time::Instant::now();
        match tokio::time::timeout(self.stop_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(service = %self.name, %status, "service exited after SIGTERM");
                self.state = ProcessState::Stopped;
                let remaining = self.stop_timeout.saturating_sub(started.elapsed());
                if self.await_group_exit(remaining).await {
                    StepOutcome::Stopped
                } else {
                    self.kill_survivors()
                }
            }
            Ok(Err(e)) => {
                self.state = ProcessState::Failed;
                StepOutcome::Failed(
                    TeardownError::Wait {
                        service: self.name.clone(),
                        reason: e.to_string(),
                    }
                    .to_string(),
                )
            }
            Err(_) => self.kill().await,
        }
    }

    async fn kill(&mut self) -> StepOutcome {
        tracing::warn!(
            service = %self.name,
            timeout_secs = self.stop_timeout.as_secs(),
            "service ignored SIGTERM, sending SIGKILL"
        );
        let signal_result = self.send(StopSignal::Kill);
        let _ = self.child.start_kill();

        match self.child.wait().await {
            Ok(_) => {
                self.state = ProcessState::Stopped;
                StepOutcome::Killed
            }
            Err(e) => {
                self.state = ProcessState::Failed;
                let reason = match signal_result {
                    Err(signal_err) => signal_err.to_string(),
                    Ok(()) => TeardownError::Wait {
                        service: self.name.clone(),
                        reason: e.to_string(),
                    }
                    .to_string(),
                };
                StepOutcome::Failed(reason)
            }
        }
    }

    /// Wait until no process of the group is left, at most `within`.
    ///
    /// The leader exiting does not mean its helpers did: the default launch
    /// command runs the real service as a grandchild.
    async fn await_group_exit(&self, within: Duration) -> bool {
        let Some(pgid) = self.pgid else {
            return true;
        };
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if !group_has_members(pgid) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }
    }

    fn kill_survivors(&mut self) -> StepOutcome {
        tracing::warn!(
            service = %self.name,
            pgid = ?self.pgid,
            "group members outlived the leader, sending SIGKILL"
        );
        match self.send(StopSignal::Kill) {
            Ok(()) => StepOutcome::Killed,
            Err(_) if !self.pgid.is_some_and(group_has_members) => StepOutcome::Stopped,
            Err(e) => {
                self.state = ProcessState::Failed;
                StepOutcome::Failed(e.to_string())
            }
        }
    }

    fn send(&self, signal: StopSignal) -> Result<(), TeardownError> {
        match self.pgid {
            Some(pgid) => signal_group(pgid, signal).map_err(|reason| TeardownError::Signal {
                service: self.name.clone(),
                reason,
            }),
            None => Err(TeardownError::Signal {
                service: self.name.clone(),
                reason: "no process group recorded".to_owned(),
            }),
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("name", &self.name)
            .field("pid", &self.pid)
            .field("pgid", &self.pgid)
            .field("state", &self.state)
            .field("log_path", &self.log_path)
            .finish()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // Last-resort cleanup if the orchestrator unwound without teardown
        if self.state == ProcessState::Running {
            tracing::warn!(service = %self.name, "process handle dropped while running, killing group");
            let _ = self.send(StopSignal::Kill);
            let _ = self.child.start_kill();
        }
    }
}

/// Deliver `signal` to every process in group `pgid`.
#[cfg(unix)]
pub fn signal_group(pgid: i32, signal: StopSignal) -> Result<(), String> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let sig = match signal {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    killpg(Pid::from_raw(pgid), sig).map_err(|e| format!("killpg({pgid}, {sig}): {e}"))
}

/// Process groups are unix-only; callers fall back to killing the direct child.
#[cfg(not(unix))]
pub fn signal_group(pgid: i32, _signal: StopSignal) -> Result<(), String> {
    Err(format!("process group {pgid}: not supported on this platform"))
}

/// Whether any process, zombies included, still belongs to group `pgid`.
#[cfg(unix)]
pub fn group_has_members(pgid: i32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    !matches!(killpg(Pid::from_raw(pgid), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
pub fn group_has_members(_pgid: i32) -> bool {
    false
}
