//! 실행 상태 기계
//!
//! `Init → DependencyUp → StateCleared → ServicesUp → ScenariosRun → TornDown → Reported`
//!
//! 어느 셋업 단계에서 실패하든 `TornDown`으로 바로 건너뛸 수 있지만,
//! 재시도(역방향) 전이는 없습니다.

use std::fmt;

use serde::Serialize;

/// 실행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    DependencyUp,
    StateCleared,
    ServicesUp,
    ScenariosRun,
    TornDown,
    Reported,
}

impl Phase {
    /// 정상 진행 시 다음 단계
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::DependencyUp),
            Self::DependencyUp => Some(Self::StateCleared),
            Self::StateCleared => Some(Self::ServicesUp),
            Self::ServicesUp => Some(Self::ScenariosRun),
            Self::ScenariosRun => Some(Self::TornDown),
            Self::TornDown => Some(Self::Reported),
            Self::Reported => None,
        }
    }

    /// `self`에서 `to`로의 전이가 허용되는지 여부
    ///
    /// 정리 이전의 모든 단계는 `TornDown`으로 바로 갈 수 있습니다.
    pub fn can_transition_to(self, to: Self) -> bool {
        self.next() == Some(to) || (to == Self::TornDown && self < Self::TornDown)
    }

    /// 종료 상태 여부
    pub fn is_terminal(self) -> bool {
        self == Self::Reported
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::DependencyUp => "dependency_up",
            Self::StateCleared => "state_cleared",
            Self::ServicesUp => "services_up",
            Self::ScenariosRun => "scenarios_run",
            Self::TornDown => "torn_down",
            Self::Reported => "reported",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
