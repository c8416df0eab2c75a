//! 컨테이너 오케스트레이션 명령 실행
//!
//! 브로커 컨테이너는 `docker compose` CLI로 올리고 내립니다.
//! [`ComposeRunner`] 트레이트로 추상화하여 테스트에서는 실제 명령 없이 대체합니다.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use qbridge_e2e_core::config::ComposeConfig;
use qbridge_e2e_core::error::{DependencyStartupError, TeardownError};

/// stderr 출력 중 에러 메시지에 포함할 최대 바이트
const MAX_STDERR_BYTES: usize = 4096;

/// 컨테이너 오케스트레이션 up/down 추상화
///
/// # 구현체
///
/// - [`DockerCompose`]: `<program> compose -f <file> up -d` / `down` 실행
pub trait ComposeRunner: Send + Sync {
    /// 의존성 컨테이너를 백그라운드로 기동합니다.
    ///
    /// # Errors
    ///
    /// - 명령 실행 불가: `DependencyStartupError::ComposeSpawn`
    /// - 0이 아닌 종료 코드: `DependencyStartupError::ComposeFailed`
    fn up(&self) -> impl Future<Output = Result<(), DependencyStartupError>> + Send;

    /// 의존성 컨테이너를 내립니다.
    ///
    /// # Errors
    ///
    /// 명령 실행 불가 또는 실패 시 `TeardownError::ComposeDown`
    fn down(&self) -> impl Future<Output = Result<(), TeardownError>> + Send;
}

/// `docker compose` CLI 실행기
#[derive(Debug, Clone)]
pub struct DockerCompose {
    program: String,
    file: PathBuf,
    project_name: Option<String>,
    work_dir: Option<PathBuf>,
}

impl DockerCompose {
    pub fn new(config: &ComposeConfig) -> Self {
        Self {
            program: config.program.clone(),
            file: config.file.clone(),
            project_name: config.project_name.clone(),
            work_dir: None,
        }
    }

    /// compose 파일 상대 경로의 기준 디렉토리
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// 하위 명령에 전달할 인자 목록 (`compose -f <file> [-p <project>] <action...>`)
    pub fn args(&self, action: &[&str]) -> Vec<String> {
        let mut args = vec![
            "compose".to_owned(),
            "-f".to_owned(),
            self.file.display().to_string(),
        ];
        if let Some(project) = &self.project_name {
            args.push("-p".to_owned());
            args.push(project.clone());
        }
        args.extend(action.iter().map(|a| (*a).to_owned()));
        args
    }

    fn command_line(&self, action: &[&str]) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args(action))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 명령을 실행하고 실패 시 (명령줄, 사유, stderr)를 반환합니다.
    async fn run(&self, action: &[&str]) -> Result<(), ComposeFailure> {
        let command_line = self.command_line(action);
        tracing::info!(command = %command_line, "running container orchestration command");

        let mut command = Command::new(&self.program);
        command
            .args(self.args(action))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| ComposeFailure::Spawn {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        if output.status.success() {
            tracing::debug!(command = %command_line, "command succeeded");
            Ok(())
        } else {
            Err(ComposeFailure::Exit {
                command: command_line,
                status: output.status.to_string(),
                stderr: truncate_output(&output.stderr),
            })
        }
    }
}

impl ComposeRunner for DockerCompose {
    async fn up(&self) -> Result<(), DependencyStartupError> {
        self.run(&["up", "-d"]).await.map_err(|failure| match failure {
            ComposeFailure::Spawn { command, reason } => {
                DependencyStartupError::ComposeSpawn { command, reason }
            }
            ComposeFailure::Exit {
                command,
                status,
                stderr,
            } => DependencyStartupError::ComposeFailed {
                command,
                status,
                stderr,
            },
        })
    }

    async fn down(&self) -> Result<(), TeardownError> {
        self.run(&["down"]).await.map_err(|failure| {
            let reason = match failure {
                ComposeFailure::Spawn { command, reason } => format!("'{command}': {reason}"),
                ComposeFailure::Exit {
                    command,
                    status,
                    stderr,
                } => format!("'{command}' exited with {status}: {stderr}"),
            };
            TeardownError::ComposeDown(reason)
        })
    }
}

enum ComposeFailure {
    Spawn {
        command: String,
        reason: String,
    },
    Exit {
        command: String,
        status: String,
        stderr: String,
    },
}

fn truncate_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.len() <= MAX_STDERR_BYTES {
        return text.to_owned();
    }
    // 마지막 부분에 실제 에러가 있으므로 끝을 남김
    let mut start = text.len() - MAX_STDERR_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
