//! qbridge E2E 외부 의존성 제어
//!
//! - [`compose`]: 컨테이너 오케스트레이션 CLI 실행 ([`ComposeRunner`], [`DockerCompose`])
//! - [`broker`]: 브로커 클라이언트 ([`Broker`], [`RedisBroker`])
//! - [`environment`]: 기동, 상태 초기화, 종료 ([`DependencyEnvironment`])

pub mod broker;
pub mod compose;
pub mod environment;

pub use broker::{Broker, RedisBroker};
pub use compose::{ComposeRunner, DockerCompose};
pub use environment::{ClearOutcome, DependencyEnvironment};
