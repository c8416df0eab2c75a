#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod phase;
pub mod report;
pub mod wait;

use std::future::Future;
use std::pin::Pin;

/// dyn-호환 비동기 trait 메서드를 위한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, DependencyStartupError, E2eError, ReadinessError, SpawnError, SubmissionError,
    TeardownError, VerificationError,
};

// 설정
pub use config::{E2eConfig, ReadinessSpec, ServiceSpec};

// 상태 기계
pub use phase::Phase;

// 리포트
pub use report::{
    RunReport, ScenarioResult, SetupFailure, StepOutcome, TeardownReport, TeardownStep, Verdict,
};

// 폴링
pub use wait::{Probe, WaitError, poll_until};
