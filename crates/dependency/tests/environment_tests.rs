//! DependencyEnvironment lifecycle tests with in-memory compose and broker.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use qbridge_e2e_core::config::BrokerConfig;
use qbridge_e2e_core::error::{DependencyStartupError, TeardownError};
use qbridge_e2e_dependency::{Broker, ClearOutcome, ComposeRunner, DependencyEnvironment};

#[derive(Default)]
struct MockCompose {
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail_up: bool,
    fail_down: bool,
}

impl ComposeRunner for MockCompose {
    async fn up(&self) -> Result<(), DependencyStartupError> {
        self.calls.lock().unwrap().push("up");
        if self.fail_up {
            return Err(DependencyStartupError::ComposeFailed {
                command: "docker compose -f docker-compose.yml up -d".to_owned(),
                status: "exit status: 1".to_owned(),
                stderr: "Cannot connect to the Docker daemon".to_owned(),
            });
        }
        Ok(())
    }

    async fn down(&self) -> Result<(), TeardownError> {
        self.calls.lock().unwrap().push("down");
        if self.fail_down {
            return Err(TeardownError::ComposeDown("exit status: 1".to_owned()));
        }
        Ok(())
    }
}

/// Broker whose ping fails a configurable number of times before succeeding.
#[derive(Default)]
struct MockBroker {
    pings: AtomicU32,
    failing_pings: u32,
    never_ready: bool,
    fail_delete: bool,
    remaining_after_delete: u64,
    deleted: Mutex<Vec<String>>,
}

impl MockBroker {
    fn unreachable(reason: &str) -> DependencyStartupError {
        DependencyStartupError::Unreachable {
            endpoint: "redis://mock".to_owned(),
            reason: reason.to_owned(),
        }
    }
}

impl Broker for MockBroker {
    fn endpoint(&self) -> String {
        "redis://mock".to_owned()
    }

    async fn ping(&self) -> Result<(), DependencyStartupError> {
        let n = self.pings.fetch_add(1, Ordering::SeqCst);
        if self.never_ready || n < self.failing_pings {
            return Err(Self::unreachable("connection refused"));
        }
        Ok(())
    }

    async fn delete_stream(&self, stream: &str) -> Result<u64, DependencyStartupError> {
        if self.fail_delete {
            return Err(Self::unreachable("broken pipe"));
        }
        self.deleted.lock().unwrap().push(stream.to_owned());
        Ok(1)
    }

    async fn stream_len(&self, _stream: &str) -> Result<u64, DependencyStartupError> {
        Ok(self.remaining_after_delete)
    }
}

fn broker_config() -> BrokerConfig {
    BrokerConfig {
        ready_timeout_secs: 3,
        poll_interval_ms: 500,
        ..BrokerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_waits_until_broker_answers() {
    // Given: broker refuses the first three pings
    let broker = MockBroker {
        failing_pings: 3,
        ..MockBroker::default()
    };
    let env = DependencyEnvironment::new(MockCompose::default(), broker, broker_config());

    // When
    env.start().await.unwrap();

    // Then: three failures, one success, one final check
    assert_eq!(env.broker().pings.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_start_times_out_with_last_error() {
    // Given: broker never answers
    let broker = MockBroker {
        never_ready: true,
        ..MockBroker::default()
    };
    let env = DependencyEnvironment::new(MockCompose::default(), broker, broker_config());

    // When
    let err = env.start().await.unwrap_err();

    // Then
    match err {
        DependencyStartupError::NotReady(readiness) => {
            assert!(readiness.last_error.contains("connection refused"));
            assert!(readiness.what.contains("redis://mock"));
        }
        other => panic!("expected NotReady, got {other:?}"),
    }
}

#[tokio::test]
async fn test_compose_failure_skips_ping() {
    // Given
    let compose = MockCompose {
        fail_up: true,
        ..MockCompose::default()
    };
    let env = DependencyEnvironment::new(compose, MockBroker::default(), broker_config());

    // When
    let err = env.start().await.unwrap_err();

    // Then
    assert!(matches!(err, DependencyStartupError::ComposeFailed { .. }));
    assert!(err.to_string().contains("Docker daemon"));
    assert_eq!(env.broker().pings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_clear_state_deletes_configured_stream() {
    let env = DependencyEnvironment::new(MockCompose::default(), MockBroker::default(), broker_config());

    let outcome = env.clear_configured_state().await;

    assert_eq!(outcome, ClearOutcome::Deleted(1));
    assert_eq!(*env.broker().deleted.lock().unwrap(), vec!["q_bridge_stream"]);
}

#[tokio::test]
async fn test_clear_state_failure_is_swallowed() {
    // Given: DEL fails
    let broker = MockBroker {
        fail_delete: true,
        ..MockBroker::default()
    };
    let env = DependencyEnvironment::new(MockCompose::default(), broker, broker_config());

    // When
    let outcome = env.clear_state("q_bridge_stream").await;

    // Then: reported as a value, not an error
    assert!(matches!(outcome, ClearOutcome::Failed(ref r) if r.contains("broken pipe")));
}

#[tokio::test]
async fn test_clear_state_with_leftover_entries_still_reports_deleted() {
    let broker = MockBroker {
        remaining_after_delete: 2,
        ..MockBroker::default()
    };
    let env = DependencyEnvironment::new(MockCompose::default(), broker, broker_config());

    assert_eq!(env.clear_state("s").await, ClearOutcome::Deleted(1));
}

#[tokio::test]
async fn test_stop_propagates_compose_down_failure() {
    // Given
    let calls = Arc::new(Mutex::new(Vec::new()));
    let compose = MockCompose {
        calls: calls.clone(),
        fail_down: true,
        ..MockCompose::default()
    };
    let env = DependencyEnvironment::new(compose, MockBroker::default(), broker_config());

    // When
    let err = env.stop().await.unwrap_err();

    // Then
    assert!(matches!(err, TeardownError::ComposeDown(_)));
    assert_eq!(*calls.lock().unwrap(), vec!["down"]);
}
