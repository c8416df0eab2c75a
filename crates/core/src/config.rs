//! 설정 관리: qbridge-e2e.toml 파싱 및 런타임 설정
//!
//! [`E2eConfig`]는 오케스트레이터가 사용하는 모든 엔드포인트, 경로, 시간 제한을 담는
//! 최상위 구조체입니다. 전역 상수 대신 이 값을 `Orchestrator` 생성 시 전달합니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`QBRIDGE_E2E_GATEWAY_BASE_URL=http://gw:3000` 형식)
//! 3. 설정 파일 (`qbridge-e2e.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), qbridge_e2e_core::error::E2eError> {
//! use qbridge_e2e_core::config::E2eConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = E2eConfig::load("qbridge-e2e.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = E2eConfig::parse("[broker]\nstream_name = \"other_stream\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, E2eError};

/// 설정 파일 기본 경로
pub const DEFAULT_CONFIG_PATH: &str = "qbridge-e2e.toml";

/// E2E 오케스트레이터 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct E2eConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 브로커(외부 의존성) 설정
    #[serde(default)]
    pub broker: BrokerConfig,
    /// 컨테이너 오케스트레이션 설정
    #[serde(default)]
    pub compose: ComposeConfig,
    /// 인그레스 게이트웨이 설정
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// 버퍼 소비 검증 설정
    #[serde(default)]
    pub buffer: BufferConfig,
    /// 전송 서비스 설정
    #[serde(default)]
    pub transport: TransportConfig,
    /// 기동 순서대로 나열된 서비스 목록
    #[serde(default = "default_services")]
    pub services: Vec<ServiceSpec>,
}

impl E2eConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, E2eError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides_logged();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값을 사용하고, 있으면 [`E2eConfig::load`]와 동일하게 동작합니다.
    ///
    /// 인자 없이 실행했을 때 기본 경로(`qbridge-e2e.toml`)를 위해 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, E2eError> {
        let mut config = Self::from_file_or_default(path).await?;
        config.apply_env_overrides_logged();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값을 반환합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self, E2eError> {
        let path = path.as_ref();
        match Self::from_file(path).await {
            Err(E2eError::Config(ConfigError::FileNotFound { .. })) => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, E2eError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                E2eError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                E2eError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, E2eError> {
        toml::from_str(toml_str).map_err(|e| {
            E2eError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `QBRIDGE_E2E_{SECTION}_{FIELD}`
    /// 예: `QBRIDGE_E2E_BROKER_URL=redis://cache:6379`
    ///
    /// `[[services]]` 목록은 파일로만 설정할 수 있습니다.
    ///
    /// 해석할 수 없어 무시된 값마다 한 줄씩 경고 메시지를 반환합니다. 로깅 초기화 전에
    /// 호출하는 쪽이 나중에 출력할 수 있도록 여기서는 기록하지 않습니다.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        let mut ignored = Vec::new();

        // General
        override_string(&mut self.general.log_level, "QBRIDGE_E2E_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "QBRIDGE_E2E_GENERAL_LOG_FORMAT");
        override_path(&mut self.general.work_dir, "QBRIDGE_E2E_GENERAL_WORK_DIR");
        override_path(&mut self.general.log_dir, "QBRIDGE_E2E_GENERAL_LOG_DIR");

        // Broker
        override_string(&mut self.broker.url, "QBRIDGE_E2E_BROKER_URL");
        override_string(&mut self.broker.stream_name, "QBRIDGE_E2E_BROKER_STREAM_NAME");
        override_u64(
            &mut self.broker.ready_timeout_secs,
            "QBRIDGE_E2E_BROKER_READY_TIMEOUT_SECS",
            &mut ignored,
        );
        override_u64(
            &mut self.broker.poll_interval_ms,
            "QBRIDGE_E2E_BROKER_POLL_INTERVAL_MS",
            &mut ignored,
        );
        override_u64(
            &mut self.broker.command_timeout_secs,
            "QBRIDGE_E2E_BROKER_COMMAND_TIMEOUT_SECS",
            &mut ignored,
        );

        // Compose
        override_string(&mut self.compose.program, "QBRIDGE_E2E_COMPOSE_PROGRAM");
        override_path(&mut self.compose.file, "QBRIDGE_E2E_COMPOSE_FILE");
        if let Ok(val) = std::env::var("QBRIDGE_E2E_COMPOSE_PROJECT_NAME") {
            self.compose.project_name = (!val.is_empty()).then_some(val);
        }

        // Gateway
        override_string(&mut self.gateway.base_url, "QBRIDGE_E2E_GATEWAY_BASE_URL");
        override_string(&mut self.gateway.submit_path, "QBRIDGE_E2E_GATEWAY_SUBMIT_PATH");
        override_string(&mut self.gateway.agent_id, "QBRIDGE_E2E_GATEWAY_AGENT_ID");
        override_u64(
            &mut self.gateway.request_timeout_secs,
            "QBRIDGE_E2E_GATEWAY_REQUEST_TIMEOUT_SECS",
            &mut ignored,
        );

        // Buffer
        override_string(&mut self.buffer.service, "QBRIDGE_E2E_BUFFER_SERVICE");
        override_string(&mut self.buffer.marker, "QBRIDGE_E2E_BUFFER_MARKER");
        override_u64(
            &mut self.buffer.consume_timeout_secs,
            "QBRIDGE_E2E_BUFFER_CONSUME_TIMEOUT_SECS",
            &mut ignored,
        );
        override_u64(
            &mut self.buffer.poll_interval_ms,
            "QBRIDGE_E2E_BUFFER_POLL_INTERVAL_MS",
            &mut ignored,
        );

        // Transport
        override_string(&mut self.transport.address, "QBRIDGE_E2E_TRANSPORT_ADDRESS");
        override_string(&mut self.transport.ticket, "QBRIDGE_E2E_TRANSPORT_TICKET");
        override_u64(
            &mut self.transport.expected_rows,
            "QBRIDGE_E2E_TRANSPORT_EXPECTED_ROWS",
            &mut ignored,
        );
        override_u64(
            &mut self.transport.timeout_secs,
            "QBRIDGE_E2E_TRANSPORT_TIMEOUT_SECS",
            &mut ignored,
        );

        ignored
    }

    fn apply_env_overrides_logged(&mut self) {
        for message in self.apply_env_overrides() {
            warn!("{message}");
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), E2eError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.broker.url.is_empty() {
            return Err(invalid("broker.url", "must not be empty"));
        }
        if self.broker.stream_name.is_empty() {
            return Err(invalid("broker.stream_name", "must not be empty"));
        }
        if self.compose.program.is_empty() {
            return Err(invalid("compose.program", "must not be empty"));
        }
        if self.gateway.base_url.is_empty() {
            return Err(invalid("gateway.base_url", "must not be empty"));
        }
        if !self.gateway.submit_path.starts_with('/') {
            return Err(invalid("gateway.submit_path", "must start with '/'"));
        }
        if self.transport.address.is_empty() {
            return Err(invalid("transport.address", "must not be empty"));
        }

        // 0초 제한은 폴링이 한 번도 수행되지 않음을 의미하므로 거부
        for (field, value) in [
            ("broker.ready_timeout_secs", self.broker.ready_timeout_secs),
            ("broker.poll_interval_ms", self.broker.poll_interval_ms),
            ("broker.command_timeout_secs", self.broker.command_timeout_secs),
            ("gateway.request_timeout_secs", self.gateway.request_timeout_secs),
            ("buffer.consume_timeout_secs", self.buffer.consume_timeout_secs),
            ("buffer.poll_interval_ms", self.buffer.poll_interval_ms),
            ("transport.timeout_secs", self.transport.timeout_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        let mut seen = HashSet::new();
        for (idx, service) in self.services.iter().enumerate() {
            if service.name.is_empty() {
                return Err(invalid(
                    &format!("services[{idx}].name"),
                    "must not be empty",
                ));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(invalid(
                    &format!("services[{idx}].name"),
                    format!("duplicate service name '{}'", service.name),
                ));
            }
            if service.program.is_empty() {
                return Err(invalid(
                    &format!("services[{idx}].program"),
                    "must not be empty",
                ));
            }
            if service.ready_timeout_secs == 0 {
                return Err(invalid(
                    &format!("services[{idx}].ready_timeout_secs"),
                    "must be greater than zero",
                ));
            }
        }

        if !seen.contains(self.buffer.service.as_str()) {
            return Err(invalid(
                "buffer.service",
                format!("'{}' is not a configured service", self.buffer.service),
            ));
        }

        Ok(())
    }

    /// 서비스 로그 파일 경로: `<log_dir>/<name>_service.log`
    pub fn service_log_path(&self, name: &str) -> PathBuf {
        service_log_path(&self.general.log_dir, name)
    }
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            broker: BrokerConfig::default(),
            compose: ComposeConfig::default(),
            gateway: GatewayConfig::default(),
            buffer: BufferConfig::default(),
            transport: TransportConfig::default(),
            services: default_services(),
        }
    }
}

/// `log_dir` 아래의 서비스 로그 파일 경로
pub fn service_log_path(log_dir: &Path, name: &str) -> PathBuf {
    log_dir.join(format!("{name}_service.log"))
}

fn invalid(field: &str, reason: impl Into<String>) -> E2eError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 서비스 프로세스의 작업 디렉토리
    pub work_dir: PathBuf,
    /// 서비스 로그 파일 디렉토리
    pub log_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            work_dir: PathBuf::from("."),
            log_dir: PathBuf::from("."),
        }
    }
}

/// 브로커 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// 브로커 연결 URL
    pub url: String,
    /// 실행 전에 비우는 스트림 이름
    pub stream_name: String,
    /// 기동 후 ping 응답 대기 제한 (초)
    pub ready_timeout_secs: u64,
    /// ping 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 개별 브로커 명령 제한 시간 (초)
    pub command_timeout_secs: u64,
}

impl BrokerConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_owned(),
            stream_name: "q_bridge_stream".to_owned(),
            ready_timeout_secs: 30,
            poll_interval_ms: 500,
            command_timeout_secs: 5,
        }
    }
}

/// 컨테이너 오케스트레이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// 실행 파일 (`docker`, `podman` 등)
    pub program: String,
    /// compose 매니페스트 경로
    pub file: PathBuf,
    /// compose 프로젝트 이름
    pub project_name: Option<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            program: "docker".to_owned(),
            file: PathBuf::from("docker-compose.yml"),
            project_name: None,
        }
    }
}

/// 인그레스 게이트웨이 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// 게이트웨이 기본 URL
    pub base_url: String,
    /// 제출 엔드포인트 경로
    pub submit_path: String,
    /// 제출 시 사용하는 agent_id
    pub agent_id: String,
    /// 요청 제한 시간 (초)
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    /// 제출 엔드포인트 전체 URL
    pub fn submit_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.submit_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_owned(),
            submit_path: "/submit".to_owned(),
            agent_id: "e2e-test-agent".to_owned(),
            request_timeout_secs: 10,
        }
    }
}

/// 버퍼 소비 검증 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 로그를 검사할 서비스 이름
    pub service: String,
    /// 메시지 처리를 나타내는 로그 마커
    pub marker: String,
    /// 마커 대기 제한 (초)
    pub consume_timeout_secs: u64,
    /// 로그 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
}

impl BufferConfig {
    pub fn consume_timeout(&self) -> Duration {
        Duration::from_secs(self.consume_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            service: "buffer".to_owned(),
            marker: "Processing message".to_owned(),
            consume_timeout_secs: 5,
            poll_interval_ms: 250,
        }
    }
}

/// 전송 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// 전송 서비스 주소 (`grpc://`는 `http://`로 정규화)
    pub address: String,
    /// 스트리밍 읽기 티켓
    pub ticket: String,
    /// 기대 행 개수
    pub expected_rows: u64,
    /// 연결 및 요청 제한 시간 (초)
    pub timeout_secs: u64,
}

impl TransportConfig {
    /// RPC 클라이언트가 이해하는 형식으로 주소를 정규화합니다.
    pub fn endpoint(&self) -> String {
        match self.address.strip_prefix("grpc://") {
            Some(rest) => format!("http://{rest}"),
            None => match self.address.strip_prefix("grpc+tls://") {
                Some(rest) => format!("https://{rest}"),
                None => self.address.clone(),
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: "grpc://localhost:50052".to_owned(),
            ticket: "test_ticket".to_owned(),
            expected_rows: 0,
            timeout_secs: 10,
        }
    }
}

/// 기동할 서비스 하나의 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    /// 실행 단위 내에서 유일한 논리 이름
    pub name: String,
    /// 실행 파일
    pub program: String,
    /// 실행 인자
    pub args: Vec<String>,
    /// 준비 완료 확인 방법
    pub ready: ReadinessSpec,
    /// 준비 완료 대기 제한 (초)
    pub ready_timeout_secs: u64,
    /// SIGTERM 후 SIGKILL까지 대기 시간 (초)
    pub stop_timeout_secs: u64,
}

impl ServiceSpec {
    /// `cargo run --bin <name>` 형태의 서비스 정의
    pub fn cargo_bin(name: &str, ready: ReadinessSpec) -> Self {
        Self {
            name: name.to_owned(),
            program: "cargo".to_owned(),
            args: vec!["run".to_owned(), "--bin".to_owned(), name.to_owned()],
            ready,
            ..Self::default()
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// 로그 출력용 명령줄
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            program: String::new(),
            args: Vec::new(),
            ready: ReadinessSpec::default(),
            // 기본 명령은 서비스를 컴파일하므로 넉넉하게 설정
            ready_timeout_secs: 120,
            stop_timeout_secs: 10,
        }
    }
}

/// 서비스 준비 완료 확인 방법
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadinessSpec {
    /// 고정 대기 후 준비된 것으로 간주
    Settle { millis: u64 },
    /// TCP 연결이 성공하면 준비 완료
    Tcp { address: String },
    /// 서비스 로그에 마커가 나타나면 준비 완료
    LogMarker { marker: String },
}

impl Default for ReadinessSpec {
    fn default() -> Self {
        Self::Settle { millis: 5_000 }
    }
}

fn default_services() -> Vec<ServiceSpec> {
    vec![
        ServiceSpec::cargo_bin(
            "gateway",
            ReadinessSpec::Tcp {
                address: "127.0.0.1:3000".to_owned(),
            },
        ),
        ServiceSpec::cargo_bin(
            "buffer",
            ReadinessSpec::LogMarker {
                marker: "Waiting for messages".to_owned(),
            },
        ),
        ServiceSpec::cargo_bin(
            "transport",
            ReadinessSpec::Tcp {
                address: "127.0.0.1:50052".to_owned(),
            },
        ),
    ]
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_u64(target: &mut u64, env_key: &str, ignored: &mut Vec<String>) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => ignored.push(format!(
                "ignoring {env_key}={val:?}: not an unsigned integer"
            )),
        }
    }
}
