//! 제한 시간이 있는 준비 완료 폴링
//!
//! 고정 대기(settle delay) 대신 명시적인 준비 확인(ping, TCP 연결, 로그 마커)을
//! 최대 대기 시간 안에서 반복합니다. 프로브는 최소 한 번 실행됩니다.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ReadinessError;

/// 프로브 한 번의 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// 준비 완료
    Ready,
    /// 아직 준비되지 않음 (사유)
    Pending(String),
    /// 더 기다려도 소용없음 (예: 프로세스 종료)
    Abort(String),
}

/// 폴링 실패
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// 제한 시간 초과
    #[error(transparent)]
    TimedOut(#[from] ReadinessError),

    /// 프로브가 중단을 요청함
    #[error("{0}")]
    Aborted(String),
}

/// `probe`가 [`Probe::Ready`]를 반환할 때까지 `interval` 간격으로 반복합니다.
///
/// 성공 시 준비까지 걸린 시간을 반환합니다.
pub async fn poll_until<F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<Duration, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let last_error = match probe().await {
            Probe::Ready => {
                let waited = start.elapsed();
                tracing::debug!(what, attempts, waited_ms = waited.as_millis() as u64, "ready");
                return Ok(waited);
            }
            Probe::Abort(reason) => return Err(WaitError::Aborted(reason)),
            Probe::Pending(reason) => reason,
        };

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(ReadinessError {
                what: what.to_owned(),
                waited: elapsed,
                last_error,
            }
            .into());
        }

        tracing::trace!(what, attempts, reason = %last_error, "not ready yet");
        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn returns_after_probe_becomes_ready() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let waited = poll_until(
            "counter",
            Duration::from_secs(10),
            Duration::from_millis(100),
            move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) >= 2 {
                    Probe::Ready
                } else {
                    Probe::Pending("warming up".to_owned())
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(waited, Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_error() {
        let err = poll_until(
            "broker ping",
            Duration::from_secs(1),
            Duration::from_millis(300),
            || async { Probe::Pending("connection refused".to_owned()) },
        )
        .await
        .unwrap_err();

        match err {
            WaitError::TimedOut(e) => {
                assert_eq!(e.what, "broker ping");
                assert_eq!(e.last_error, "connection refused");
                assert!(e.waited >= Duration::from_secs(1));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abort_stops_polling_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = poll_until(
            "service",
            Duration::from_secs(60),
            Duration::from_secs(1),
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Probe::Abort("exited with status 1".to_owned())
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Aborted(ref r) if r.contains("status 1")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_runs_at_least_once_with_zero_timeout() {
        let waited = poll_until("instant", Duration::ZERO, Duration::from_millis(10), || async {
            Probe::Ready
        })
        .await
        .unwrap();
        assert!(waited < Duration::from_secs(1));
    }
}
