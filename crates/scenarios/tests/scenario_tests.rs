//! Scenario tests against stand-in gateway, buffer log and transport.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use qbridge_e2e_core::error::{E2eError, SubmissionError, VerificationError};
use qbridge_e2e_scenarios::{
    BufferConsumption, GatewaySubmission, Scenario, TransportConnectivity,
};

use helpers::{GatewayReply, TransportReply, closed_addr, endpoints, serve_gateway, serve_transport};

// ---------------------------------------------------------------------------
// Gateway submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_gateway_accepted_yields_request_id_artifact() {
    // Given: a gateway that accepts
    let (addr, seen) = serve_gateway(GatewayReply::Accepted(serde_json::json!({
        "request_id": "7f9c-req",
        "status": "accepted",
    })))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(Some(addr), None, &dir.path().join("buffer_service.log"));

    // When
    let outcome = GatewaySubmission.execute(&endpoints).await.unwrap();

    // Then: artifact is the request id, body carries agent and correlation payload
    assert_eq!(outcome.artifact.as_deref(), Some("7f9c-req"));
    let body = seen.lock().unwrap().clone().unwrap();
    assert_eq!(body["agent_id"], "e2e-test-agent");
    assert!(body["payload"].as_str().unwrap().starts_with("test_data_"));
}

#[tokio::test]
async fn test_gateway_ok_instead_of_accepted_fails() {
    // Given: 200 with a valid body is still not 202
    let (addr, _) = serve_gateway(GatewayReply::Status(
        StatusCode::OK,
        r#"{"request_id":"x"}"#.to_owned(),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(Some(addr), None, &dir.path().join("b.log"));

    // When
    let err = GatewaySubmission.execute(&endpoints).await.unwrap_err();

    // Then
    assert!(matches!(
        err,
        E2eError::Submission(SubmissionError::UnexpectedStatus { status: 200, .. })
    ));
}

#[tokio::test]
async fn test_gateway_server_error_reports_body() {
    let (addr, _) = serve_gateway(GatewayReply::Status(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to write to buffer".to_owned(),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(Some(addr), None, &dir.path().join("b.log"));

    let err = GatewaySubmission.execute(&endpoints).await.unwrap_err();

    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("Failed to write to buffer"));
}

#[tokio::test]
async fn test_gateway_accepted_without_request_id_fails() {
    let (addr, _) =
        serve_gateway(GatewayReply::Accepted(serde_json::json!({ "status": "accepted" }))).await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(Some(addr), None, &dir.path().join("b.log"));

    let err = GatewaySubmission.execute(&endpoints).await.unwrap_err();

    assert!(matches!(
        err,
        E2eError::Submission(SubmissionError::MissingRequestId { .. })
    ));
}

#[tokio::test]
async fn test_gateway_unreachable_is_request_error() {
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(Some(closed_addr()), None, &dir.path().join("b.log"));

    let err = GatewaySubmission.execute(&endpoints).await.unwrap_err();

    assert!(matches!(err, E2eError::Submission(SubmissionError::Request { .. })));
}

#[tokio::test]
async fn test_gateway_that_never_answers_times_out() {
    // Given: the gateway accepts the connection but stalls past request_timeout_secs (2s)
    let (addr, _) = serve_gateway(GatewayReply::Stall(Duration::from_secs(30))).await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(Some(addr), None, &dir.path().join("b.log"));

    // When
    let started = std::time::Instant::now();
    let err = GatewaySubmission.execute(&endpoints).await.unwrap_err();

    // Then
    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
    assert!(matches!(err, E2eError::Submission(SubmissionError::Request { .. })));
}

// ---------------------------------------------------------------------------
// Buffer consumption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_buffer_marker_logged_late_still_passes() {
    // Given: the marker shows up after a short delay
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("buffer_service.log");
    std::fs::write(&log, "Waiting for messages...\n").unwrap();
    let endpoints = endpoints(None, None, &log);

    let writer_log = log.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut content = std::fs::read_to_string(&writer_log).unwrap();
        content.push_str("Processing message id=1-0\n");
        std::fs::write(&writer_log, content).unwrap();
    });

    // When
    let outcome = BufferConsumption.execute(&endpoints).await.unwrap();

    // Then
    assert!(outcome.diagnostic.contains("Processing message"));
}

#[tokio::test]
async fn test_buffer_missing_marker_includes_full_log() {
    // Given: the buffer never processed anything
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("buffer_service.log");
    std::fs::write(&log, "Waiting for messages...\nredis: connection reset\n").unwrap();
    let endpoints = endpoints(None, None, &log);

    // When
    let err = BufferConsumption.execute(&endpoints).await.unwrap_err();

    // Then: the diagnostic carries the captured log verbatim
    match &err {
        E2eError::Verification(VerificationError::MarkerNotFound { marker, log, .. }) => {
            assert_eq!(marker, "Processing message");
            assert!(log.contains("redis: connection reset"));
        }
        other => panic!("expected MarkerNotFound, got {other:?}"),
    }
    assert!(err.to_string().contains("redis: connection reset"));
}

#[tokio::test]
async fn test_buffer_missing_log_is_log_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(None, None, &dir.path().join("never_written.log"));

    let err = BufferConsumption.execute(&endpoints).await.unwrap_err();

    assert!(matches!(err, E2eError::Verification(VerificationError::LogRead { .. })));
}

// ---------------------------------------------------------------------------
// Transport connectivity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_transport_empty_stream_matches_zero_rows() {
    // Given: transport returns no data, like the placeholder service
    let (addr, tickets) = serve_transport(TransportReply::Empty).await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(None, Some(addr), &dir.path().join("b.log"));

    // When
    let outcome = TransportConnectivity.execute(&endpoints).await.unwrap();

    // Then: configured ticket was sent
    assert!(outcome.diagnostic.contains("0 row(s)"));
    assert_eq!(*tickets.lock().unwrap(), vec![b"test_ticket".to_vec()]);
}

#[tokio::test]
async fn test_transport_rows_summed_across_batches() {
    // Given: 3 batches of 4 rows, expecting 12
    let (addr, _) = serve_transport(TransportReply::Rows { batches: 3, rows: 4 }).await;
    let dir = tempfile::tempdir().unwrap();
    let mut endpoints = endpoints(None, Some(addr), &dir.path().join("b.log"));
    endpoints.transport.expected_rows = 12;

    // When
    let outcome = TransportConnectivity.execute(&endpoints).await.unwrap();

    // Then
    assert!(outcome.diagnostic.contains("12 row(s) in 3 batch(es)"));
}

#[tokio::test]
async fn test_transport_unexpected_rows_fail() {
    let (addr, _) = serve_transport(TransportReply::Rows { batches: 1, rows: 5 }).await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(None, Some(addr), &dir.path().join("b.log"));

    let err = TransportConnectivity.execute(&endpoints).await.unwrap_err();

    assert!(matches!(
        err,
        E2eError::Verification(VerificationError::RowCountMismatch {
            expected: 0,
            actual: 5
        })
    ));
}

#[tokio::test]
async fn test_transport_status_error_is_stream_error() {
    let (addr, _) = serve_transport(TransportReply::NotFound).await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(None, Some(addr), &dir.path().join("b.log"));

    let err = TransportConnectivity.execute(&endpoints).await.unwrap_err();

    assert!(matches!(err, E2eError::Verification(VerificationError::TransportStream(_))));
    assert!(err.to_string().contains("unknown ticket"));
}

#[tokio::test]
async fn test_transport_unreachable_is_connect_error() {
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(None, Some(closed_addr()), &dir.path().join("b.log"));

    let err = TransportConnectivity.execute(&endpoints).await.unwrap_err();

    assert!(matches!(
        err,
        E2eError::Verification(VerificationError::TransportConnect { .. })
    ));
}

#[tokio::test]
async fn test_transport_stream_that_never_yields_times_out() {
    // Given: DoGet answers but the stream stays open without data
    let (addr, _) = serve_transport(TransportReply::Stall).await;
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints(None, Some(addr), &dir.path().join("b.log"));

    // When
    let started = std::time::Instant::now();
    let err = TransportConnectivity.execute(&endpoints).await.unwrap_err();

    // Then
    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
    assert!(matches!(err, E2eError::Verification(VerificationError::TransportStream(_))));
    assert!(err.to_string().contains("did not finish within"), "{err}");
}
