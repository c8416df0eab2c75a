//! 외부 상태 의존성(브로커) 수명 주기
//!
//! ```text
//! start():       compose up -d ──▶ PING 폴링 (제한 시간) ──▶ 최종 PING
//! clear_state(): DEL <stream> ──▶ XLEN 확인 (실패는 기록만)
//! stop():        compose down (실패는 TeardownError로 보고)
//! ```

use std::fmt;

use qbridge_e2e_core::config::BrokerConfig;
use qbridge_e2e_core::error::{DependencyStartupError, TeardownError};
use qbridge_e2e_core::wait::{Probe, WaitError, poll_until};

use crate::broker::Broker;
use crate::compose::ComposeRunner;

/// 상태 초기화 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// 삭제된 키 수 (스트림이 없었으면 0)
    Deleted(u64),
    /// 브로커 연결 실패 등으로 삭제하지 못함
    Failed(String),
}

impl fmt::Display for ClearOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted(0) => write!(f, "stream absent"),
            Self::Deleted(n) => write!(f, "deleted {n} key(s)"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// 브로커 컨테이너와 그 상태를 관리합니다.
pub struct DependencyEnvironment<C, B> {
    compose: C,
    broker: B,
    config: BrokerConfig,
}

impl<C: ComposeRunner, B: Broker> DependencyEnvironment<C, B> {
    pub fn new(compose: C, broker: B, config: BrokerConfig) -> Self {
        Self {
            compose,
            broker,
            config,
        }
    }

    /// 컨테이너를 올리고 브로커가 응답할 때까지 기다립니다.
    ///
    /// # Errors
    ///
    /// - compose 실패: `ComposeSpawn` / `ComposeFailed`
    /// - 제한 시간 내 PING 실패: `NotReady`
    /// - 최종 확인 실패: `Unreachable`
    pub async fn start(&self) -> Result<(), DependencyStartupError> {
        self.compose.up().await?;

        let endpoint = self.broker.endpoint();
        let what = format!("broker ping at {endpoint}");
        let broker = &self.broker;
        let result = poll_until(
            &what,
            self.config.ready_timeout(),
            self.config.poll_interval(),
            move || async move {
                match broker.ping().await {
                    Ok(()) => Probe::Ready,
                    Err(e) => Probe::Pending(e.to_string()),
                }
            },
        )
        .await;

        match result {
            Ok(waited) => {
                tracing::debug!(endpoint = %endpoint, waited_ms = waited.as_millis() as u64, "broker answered");
            }
            Err(WaitError::TimedOut(e)) => return Err(DependencyStartupError::NotReady(e)),
            Err(WaitError::Aborted(reason)) => {
                return Err(DependencyStartupError::Unreachable { endpoint, reason });
            }
        }

        // 준비 완료 직후 연결이 유지되는지 한 번 더 확인
        self.broker.ping().await?;
        tracing::info!(endpoint = %endpoint, "dependency environment is up");
        Ok(())
    }

    /// 설정된 스트림을 삭제하여 깨끗한 상태로 만듭니다.
    pub async fn clear_configured_state(&self) -> ClearOutcome {
        let stream = self.config.stream_name.clone();
        self.clear_state(&stream).await
    }

    /// 스트림을 삭제합니다. 실패해도 에러를 반환하지 않고 결과만 돌려줍니다.
    ///
    /// 스트림이 없던 경우는 `Deleted(0)`입니다.
    pub async fn clear_state(&self, stream: &str) -> ClearOutcome {
        let deleted = match self.broker.delete_stream(stream).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(stream, error = %e, "failed to clear broker state");
                return ClearOutcome::Failed(e.to_string());
            }
        };

        match self.broker.stream_len(stream).await {
            Ok(0) => {}
            Ok(len) => tracing::warn!(stream, len, "stream not empty after delete"),
            Err(e) => tracing::warn!(stream, error = %e, "could not verify stream is empty"),
        }

        let outcome = ClearOutcome::Deleted(deleted);
        tracing::info!(stream, outcome = %outcome, "broker state cleared");
        outcome
    }

    /// 컨테이너를 내립니다.
    ///
    /// # Errors
    ///
    /// `TeardownError::ComposeDown`: 호출자가 경고로 보고합니다.
    pub async fn stop(&self) -> Result<(), TeardownError> {
        match self.compose.down().await {
            Ok(()) => {
                tracing::info!("dependency environment stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "dependency environment shutdown failed");
                Err(e)
            }
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}
