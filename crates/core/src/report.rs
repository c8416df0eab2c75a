//! 실행 결과: 시나리오 판정, 정리 보고, 최종 리포트
//!
//! [`ScenarioResult`]는 생성 후 변경되지 않습니다(필드는 읽기 전용 접근자로만 노출).
//! [`RunReport`]는 정리가 시도된 뒤 한 번만 집계됩니다.

use std::time::Duration;

use serde::Serialize;

use crate::phase::Phase;

/// 시나리오 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        }
    }
}

/// 시나리오 하나의 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    name: String,
    verdict: Verdict,
    diagnostic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<String>,
    elapsed_ms: u64,
}

impl ScenarioResult {
    /// 통과 결과
    pub fn passed(
        name: impl Into<String>,
        diagnostic: impl Into<String>,
        artifact: Option<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Passed,
            diagnostic: diagnostic.into(),
            artifact,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// 실패 결과
    pub fn failed(name: impl Into<String>, diagnostic: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Failed,
            diagnostic: diagnostic.into(),
            artifact: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }

    /// 시스템이 생성한 상관 식별자 등
    pub fn artifact(&self) -> Option<&str> {
        self.artifact.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn is_passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }
}

/// 정리 단계 하나의 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    /// 정상 종료됨
    Stopped,
    /// 이미 종료된 상태 (아무 작업도 하지 않음)
    AlreadyStopped,
    /// 유예 시간 내에 종료되지 않아 강제 종료됨
    Killed,
    /// 종료 실패
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// 정리 대상 하나에 대한 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownStep {
    /// 대상 이름 (서비스 이름 또는 "dependency")
    pub resource: String,
    /// 대상 프로세스 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// 결과
    pub outcome: StepOutcome,
}

impl TeardownStep {
    pub fn new(resource: impl Into<String>, pid: Option<u32>, outcome: StepOutcome) -> Self {
        Self {
            resource: resource.into(),
            pid,
            outcome,
        }
    }
}

/// 정리 단계 결과 누적
///
/// 예외 삼키기 대신 각 단계의 결과를 값으로 모아 실패를 드러냅니다.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    steps: Vec<TeardownStep>,
}

impl TeardownReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: TeardownStep) {
        self.steps.push(step);
    }

    pub fn extend(&mut self, other: TeardownReport) {
        self.steps.extend(other.steps);
    }

    /// 시도된 순서대로의 단계 목록
    pub fn steps(&self) -> &[TeardownStep] {
        &self.steps
    }

    /// 실패한 단계만
    pub fn failures(&self) -> impl Iterator<Item = &TeardownStep> {
        self.steps.iter().filter(|s| s.outcome.is_failure())
    }

    /// 모든 단계가 실패 없이 끝났는지
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// 셋업 실패 정보
#[derive(Debug, Clone, Serialize)]
pub struct SetupFailure {
    /// 실패 직전에 도달한 단계
    pub reached: Phase,
    /// 에러 메시지
    pub message: String,
}

/// 실행 전체의 최종 리포트
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    results: Vec<ScenarioResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    setup_failure: Option<SetupFailure>,
    teardown: TeardownReport,
    warnings: Vec<String>,
    passed: bool,
    exit_code: i32,
}

impl RunReport {
    /// 결과를 집계합니다.
    ///
    /// 셋업 실패가 없고, 기대한 시나리오가 모두 실행되어 모두 통과했을 때만 통과입니다.
    /// 정리 실패는 경고로만 남고 판정에 영향을 주지 않습니다.
    pub fn new(
        results: Vec<ScenarioResult>,
        expected_scenarios: usize,
        setup_failure: Option<SetupFailure>,
        teardown: TeardownReport,
    ) -> Self {
        let warnings = teardown
            .steps()
            .iter()
            .filter_map(|step| match &step.outcome {
                StepOutcome::Failed(reason) => {
                    Some(format!("teardown of {} failed: {}", step.resource, reason))
                }
                _ => None,
            })
            .collect();

        let passed = setup_failure.is_none()
            && results.len() == expected_scenarios
            && results.iter().all(ScenarioResult::is_passed);

        Self {
            results,
            setup_failure,
            teardown,
            warnings,
            passed,
            exit_code: if passed { 0 } else { 1 },
        }
    }

    /// 정리 이외 단계의 경고를 앞쪽에 추가합니다 (예: 상태 초기화 실패). 판정은 바뀌지 않습니다.
    pub fn with_warnings(mut self, extra: Vec<String>) -> Self {
        let mut warnings = extra;
        warnings.append(&mut self.warnings);
        self.warnings = warnings;
        self
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    pub fn setup_failure(&self) -> Option<&SetupFailure> {
        self.setup_failure.as_ref()
    }

    pub fn teardown(&self) -> &TeardownReport {
        &self.teardown
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// 전체 판정 (모든 시나리오 판정의 논리곱)
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// 프로세스 종료 코드: 통과 0, 그 외 1
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}
