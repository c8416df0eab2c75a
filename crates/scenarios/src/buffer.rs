//! Buffer consumption: the buffer service logs that it processed a message.
//!
//! This is a coarse check. Any occurrence of the marker passes, including one
//! caused by a message other than the gateway submission of this run.

use std::path::Path;

use qbridge_e2e_core::BoxFuture;
use qbridge_e2e_core::error::{E2eError, VerificationError};
use qbridge_e2e_core::wait::{Probe, WaitError, poll_until};

use crate::scenario::{Scenario, ScenarioOutcome, SystemEndpoints};

#[derive(Debug, Default, Clone, Copy)]
pub struct BufferConsumption;

impl BufferConsumption {
    pub const NAME: &'static str = "buffer_consumption";

    async fn verify(endpoints: &SystemEndpoints) -> Result<ScenarioOutcome, VerificationError> {
        let config = &endpoints.buffer;
        let log_path = endpoints.buffer_log.as_path();
        let marker = config.marker.as_str();

        let what = format!("marker '{marker}' in {}", log_path.display());
        let result = poll_until(&what, config.consume_timeout(), config.poll_interval(), move || async move {
            match tokio::fs::read_to_string(log_path).await {
                Ok(content) if content.contains(marker) => Probe::Ready,
                Ok(_) => Probe::Pending("marker not logged yet".to_owned()),
                Err(e) => Probe::Pending(e.to_string()),
            }
        })
        .await;

        match result {
            Ok(waited) => {
                tracing::info!(marker, waited_ms = waited.as_millis() as u64, "buffer consumed message");
                Ok(ScenarioOutcome::new(format!(
                    "'{marker}' found in {} after {waited:?}",
                    log_path.display()
                )))
            }
            Err(WaitError::TimedOut(e)) => Err(marker_not_found(log_path, marker, e.waited).await),
            Err(WaitError::Aborted(reason)) => Err(VerificationError::LogRead {
                path: log_path.display().to_string(),
                reason,
            }),
        }
    }
}

impl Scenario for BufferConsumption {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute<'a>(
        &'a self,
        endpoints: &'a SystemEndpoints,
    ) -> BoxFuture<'a, Result<ScenarioOutcome, E2eError>> {
        Box::pin(async move { Self::verify(endpoints).await.map_err(E2eError::from) })
    }
}

/// Failure carrying the entire captured log.
async fn marker_not_found(
    log_path: &Path,
    marker: &str,
    waited: std::time::Duration,
) -> VerificationError {
    match tokio::fs::read_to_string(log_path).await {
        Ok(log) => VerificationError::MarkerNotFound {
            marker: marker.to_owned(),
            path: log_path.display().to_string(),
            waited,
            log,
        },
        Err(e) => VerificationError::LogRead {
            path: log_path.display().to_string(),
            reason: e.to_string(),
        },
    }
}
