//! The [`Scenario`] trait and the endpoints scenarios talk to.

use std::path::PathBuf;

use qbridge_e2e_core::BoxFuture;
use qbridge_e2e_core::config::{BufferConfig, E2eConfig, GatewayConfig, TransportConfig};
use qbridge_e2e_core::error::E2eError;

/// Where the system under test can be reached.
#[derive(Debug, Clone)]
pub struct SystemEndpoints {
    pub gateway: GatewayConfig,
    pub buffer: BufferConfig,
    /// Captured output of the buffer service.
    pub buffer_log: PathBuf,
    pub transport: TransportConfig,
}

impl SystemEndpoints {
    pub fn from_config(config: &E2eConfig) -> Self {
        Self {
            gateway: config.gateway.clone(),
            buffer: config.buffer.clone(),
            buffer_log: config.service_log_path(&config.buffer.service),
            transport: config.transport.clone(),
        }
    }
}

/// What a passing scenario observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    pub diagnostic: String,
    /// Identifier produced by the system, e.g. a request id.
    pub artifact: Option<String>,
}

impl ScenarioOutcome {
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }
}

/// One black-box check against the running system.
///
/// Uses `BoxFuture` so scenarios can be stored as `Box<dyn Scenario>`.
/// A scenario reports failure through its `Err`; it never panics.
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    fn execute<'a>(
        &'a self,
        endpoints: &'a SystemEndpoints,
    ) -> BoxFuture<'a, Result<ScenarioOutcome, E2eError>>;
}
