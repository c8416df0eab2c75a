//! Service process control for the qbridge E2E runner.
//!
//! - [`handle`]: one spawned process, its log file and process group
//! - [`probe`]: readiness checks with liveness detection
//! - [`registry`]: record of every process group created
//! - [`launcher`]: the [`ServiceLauncher`] seam and its OS implementation
//! - [`service_set`]: ordered start, reverse-order idempotent stop

pub mod handle;
pub mod launcher;
pub mod probe;
pub mod registry;
pub mod service_set;

pub use handle::{ProcessHandle, ProcessState, StopSignal};
pub use launcher::{ManagedService, OsLauncher, ServiceLauncher};
pub use registry::{ProcessGroupRegistry, TrackedProcess};
pub use service_set::ServiceSet;
