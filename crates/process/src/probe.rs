//! Service readiness checks.
//!
//! Every probe first checks that the process is still alive, so a service that
//! crashes during startup fails fast with [`SpawnError::ExitedEarly`] instead of
//! waiting out the whole readiness timeout.

use std::time::Duration;

use tokio::net::TcpStream;

use qbridge_e2e_core::config::{ReadinessSpec, ServiceSpec};
use qbridge_e2e_core::error::SpawnError;
use qbridge_e2e_core::wait::{Probe, WaitError, poll_until};

use crate::handle::ProcessHandle;

const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Wait until `handle` satisfies the readiness condition in `spec`.
///
/// Returns how long readiness took.
pub async fn await_ready(
    handle: &mut ProcessHandle,
    spec: &ServiceSpec,
    interval: Duration,
) -> Result<Duration, SpawnError> {
    let service = spec.name.clone();
    let what = format!("service '{service}'");

    let result = match &spec.ready {
        ReadinessSpec::Settle { millis } => {
            return settle(handle, &service, Duration::from_millis(*millis)).await;
        }
        ReadinessSpec::Tcp { address } => {
            poll_until(&what, spec.ready_timeout(), interval, || {
                let exited = exit_reason(handle);
                let address = address.clone();
                async move {
                    if let Some(reason) = exited {
                        return Probe::Abort(reason);
                    }
                    tcp_probe(&address).await
                }
            })
            .await
        }
        ReadinessSpec::LogMarker { marker } => {
            let log_path = handle.log_path().to_path_buf();
            poll_until(&what, spec.ready_timeout(), interval, || {
                let exited = exit_reason(handle);
                let marker = marker.clone();
                let log_path = log_path.clone();
                async move {
                    // A crash may still have logged the marker; the exit wins
                    if let Some(reason) = exited {
                        return Probe::Abort(reason);
                    }
                    match tokio::fs::read_to_string(&log_path).await {
                        Ok(content) if content.contains(&marker) => Probe::Ready,
                        Ok(_) => Probe::Pending(format!("'{marker}' not yet logged")),
                        Err(e) => Probe::Pending(format!("{}: {e}", log_path.display())),
                    }
                }
            })
            .await
        }
    };

    match result {
        Ok(waited) => {
            tracing::info!(
                service = %service,
                waited_ms = waited.as_millis() as u64,
                "service ready"
            );
            Ok(waited)
        }
        Err(WaitError::Aborted(status)) => Err(SpawnError::ExitedEarly { service, status }),
        Err(WaitError::TimedOut(source)) => Err(SpawnError::NotReady { service, source }),
    }
}

async fn settle(
    handle: &mut ProcessHandle,
    service: &str,
    delay: Duration,
) -> Result<Duration, SpawnError> {
    tracing::debug!(service, delay_ms = delay.as_millis() as u64, "waiting for service to settle");
    tokio::time::sleep(delay).await;
    match exit_reason(handle) {
        Some(status) => Err(SpawnError::ExitedEarly {
            service: service.to_owned(),
            status,
        }),
        None => Ok(delay),
    }
}

fn exit_reason(handle: &mut ProcessHandle) -> Option<String> {
    handle.poll_exit().map(|status| status.to_string())
}

async fn tcp_probe(address: &str) -> Probe {
    match tokio::time::timeout(CONNECT_ATTEMPT_TIMEOUT, TcpStream::connect(address)).await {
        Ok(Ok(_)) => Probe::Ready,
        Ok(Err(e)) => Probe::Pending(format!("connect {address}: {e}")),
        Err(_) => Probe::Pending(format!("connect {address}: timed out")),
    }
}
