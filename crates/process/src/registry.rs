//! Explicit record of every process group this run created.
//!
//! Entries are appended at spawn time, before readiness is awaited, so a
//! service that never becomes ready is still torn down. Teardown drains the
//! registry in reverse start order.

use std::fmt;

use qbridge_e2e_core::error::SpawnError;

/// One spawned service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProcess {
    pub name: String,
    pub pid: Option<u32>,
    pub pgid: Option<i32>,
}

impl fmt::Display for TrackedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.pid, self.pgid) {
            (Some(pid), Some(pgid)) => write!(f, "{} (pid {pid}, pgid {pgid})", self.name),
            (Some(pid), None) => write!(f, "{} (pid {pid})", self.name),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Spawned services in start order.
#[derive(Debug, Default)]
pub struct ProcessGroupRegistry {
    entries: Vec<TrackedProcess>,
}

impl ProcessGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a spawned service.
    ///
    /// # Errors
    ///
    /// `SpawnError::DuplicateName` if `name` is already tracked.
    pub fn register(
        &mut self,
        name: &str,
        pid: Option<u32>,
        pgid: Option<i32>,
    ) -> Result<(), SpawnError> {
        if self.contains(name) {
            return Err(SpawnError::DuplicateName(name.to_owned()));
        }
        let entry = TrackedProcess {
            name: name.to_owned(),
            pid,
            pgid,
        };
        tracing::debug!(process = %entry, "registered process group");
        self.entries.push(entry);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Tracked services in start order.
    pub fn entries(&self) -> &[TrackedProcess] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, returning them in reverse start order.
    ///
    /// A second call returns nothing, so each service is stopped at most once.
    pub fn drain_for_shutdown(&mut self) -> Vec<TrackedProcess> {
        let mut drained: Vec<_> = self.entries.drain(..).collect();
        drained.reverse();
        drained
    }
}
