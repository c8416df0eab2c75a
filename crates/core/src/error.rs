//! 에러 타입: 실행 단계별 에러 정의
//!
//! 셋업 단계 에러(`DependencyStartupError`, `SpawnError`)는 이후 단계 진행을 중단시키지만
//! 정리(teardown)는 항상 수행됩니다. 시나리오 에러(`SubmissionError`, `VerificationError`)는
//! 실패 판정으로 기록될 뿐 실행을 중단하지 않습니다.

use std::time::Duration;

/// E2E 오케스트레이터 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum E2eError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 외부 의존성(브로커) 기동 실패
    #[error("dependency startup error: {0}")]
    DependencyStartup(#[from] DependencyStartupError),

    /// 서비스 프로세스 기동 실패
    #[error("spawn error: {0}")]
    Spawn(#[from] SpawnError),

    /// 게이트웨이 제출 시나리오 실패
    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),

    /// 로그 마커 / RPC 검증 실패
    #[error("verification error: {0}")]
    Verification(#[from] VerificationError),

    /// 정리 단계 실패
    #[error("teardown error: {0}")]
    Teardown(#[from] TeardownError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 폴링 대기 시간 초과
#[derive(Debug, Clone, thiserror::Error)]
#[error("{what} not ready after {waited:?}: {last_error}")]
pub struct ReadinessError {
    /// 대기 대상 설명 (예: "broker ping")
    pub what: String,
    /// 실제 대기한 시간
    pub waited: Duration,
    /// 마지막 프로브의 실패 사유
    pub last_error: String,
}

/// 외부 의존성 기동 에러: 치명적, 서비스 기동 전에 중단
#[derive(Debug, thiserror::Error)]
pub enum DependencyStartupError {
    /// 컨테이너 오케스트레이션 명령을 실행할 수 없음
    #[error("failed to run '{command}': {reason}")]
    ComposeSpawn { command: String, reason: String },

    /// 컨테이너 오케스트레이션 명령이 0이 아닌 코드로 종료
    #[error("'{command}' exited with {status}: {stderr}")]
    ComposeFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// 브로커 연결 확인 실패
    #[error("broker unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// 브로커가 제한 시간 안에 응답하지 않음
    #[error(transparent)]
    NotReady(#[from] ReadinessError),
}

/// 서비스 프로세스 기동 에러: 치명적, 남은 서비스 기동만 중단
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// 같은 이름의 서비스가 이미 등록됨
    #[error("service '{0}' is already registered")]
    DuplicateName(String),

    /// 로그 파일 열기 실패
    #[error("cannot open log file {path}: {reason}")]
    LogFile { path: String, reason: String },

    /// 실행 파일 실행 실패
    #[error("failed to launch service '{service}': {reason}")]
    Launch { service: String, reason: String },

    /// 준비 완료 전에 프로세스가 종료됨
    #[error("service '{service}' exited before becoming ready ({status})")]
    ExitedEarly { service: String, status: String },

    /// 준비 확인 시간 초과
    #[error("service '{service}' did not become ready: {source}")]
    NotReady {
        service: String,
        #[source]
        source: ReadinessError,
    },
}

/// 게이트웨이 제출 시나리오 에러
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// 요청 전송 실패 또는 시간 초과
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// 202 이외의 상태 코드
    #[error("expected HTTP 202 Accepted, got {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// 응답 본문이 JSON 객체가 아님
    #[error("response body is not a JSON object: {0}")]
    InvalidBody(String),

    /// 응답에 request_id 필드가 없거나 비어 있음
    #[error("response body has no non-empty 'request_id' field: {body}")]
    MissingRequestId { body: String },
}

/// 검증 시나리오 에러 (로그 마커, RPC 연결)
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// 로그 파일 읽기 실패
    #[error("cannot read log file {path}: {reason}")]
    LogRead { path: String, reason: String },

    /// 로그에서 마커를 찾지 못함: 전체 로그를 진단 정보로 포함
    #[error("marker '{marker}' not found in {path} after {waited:?}\n--- captured log ---\n{log}\n--------------------")]
    MarkerNotFound {
        marker: String,
        path: String,
        waited: Duration,
        log: String,
    },

    /// 전송 서비스 연결 실패
    #[error("cannot connect to transport at {address}: {reason}")]
    TransportConnect { address: String, reason: String },

    /// 결과 스트림 읽기 실패
    #[error("transport stream failed: {0}")]
    TransportStream(String),

    /// 행 개수가 기준과 다름
    #[error("expected {expected} rows, transport returned {actual}")]
    RowCountMismatch { expected: u64, actual: u64 },
}

/// 정리 단계 에러: 서비스 단위로는 기록 후 무시, 의존성 종료 실패는 경고로 보고
#[derive(Debug, Clone, thiserror::Error)]
pub enum TeardownError {
    /// 프로세스 그룹 시그널 전송 실패
    #[error("failed to signal service '{service}': {reason}")]
    Signal { service: String, reason: String },

    /// 프로세스 종료 대기 실패
    #[error("failed waiting for service '{service}' to exit: {reason}")]
    Wait { service: String, reason: String },

    /// 컨테이너 오케스트레이션 down 명령 실패
    #[error("dependency shutdown failed: {0}")]
    ComposeDown(String),
}
