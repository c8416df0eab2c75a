//! Gateway submission: POST a request and expect it to be accepted.

use qbridge_e2e_core::BoxFuture;
use qbridge_e2e_core::error::{E2eError, SubmissionError};

use crate::scenario::{Scenario, ScenarioOutcome, SystemEndpoints};

/// Submits `{agent_id, payload}` to the gateway and requires HTTP 202 with a
/// non-empty `request_id` in the JSON body. The request id becomes the
/// scenario artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct GatewaySubmission;

impl GatewaySubmission {
    pub const NAME: &'static str = "gateway_submission";

    async fn submit(endpoints: &SystemEndpoints) -> Result<ScenarioOutcome, SubmissionError> {
        let config = &endpoints.gateway;
        let url = config.submit_url();
        let payload = correlation_payload();

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SubmissionError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(url = %url, agent_id = %config.agent_id, payload = %payload, "submitting request");
        let response = client
            .post(&url)
            .json(&serde_json::json!({
                "agent_id": config.agent_id,
                "payload": payload,
            }))
            .send()
            .await
            .map_err(|e| SubmissionError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SubmissionError::Request {
            url: url.clone(),
            reason: format!("reading body: {e}"),
        })?;

        if status != reqwest::StatusCode::ACCEPTED {
            return Err(SubmissionError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let request_id = extract_request_id(&body)?;
        tracing::info!(request_id = %request_id, "gateway accepted request");
        Ok(ScenarioOutcome::new(format!("HTTP 202, request_id={request_id}"))
            .with_artifact(request_id))
    }
}

impl Scenario for GatewaySubmission {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute<'a>(
        &'a self,
        endpoints: &'a SystemEndpoints,
    ) -> BoxFuture<'a, Result<ScenarioOutcome, E2eError>> {
        Box::pin(async move { Self::submit(endpoints).await.map_err(E2eError::from) })
    }
}

/// Unique payload so a submission can be told apart from leftovers.
fn correlation_payload() -> String {
    format!("test_data_{}", uuid::Uuid::new_v4())
}

fn extract_request_id(body: &str) -> Result<String, SubmissionError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| SubmissionError::InvalidBody(format!("{e}: {body}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| SubmissionError::InvalidBody(body.to_owned()))?;

    match object.get("request_id").and_then(serde_json::Value::as_str) {
        Some(id) if !id.trim().is_empty() => Ok(id.to_owned()),
        _ => Err(SubmissionError::MissingRequestId {
            body: body.to_owned(),
        }),
    }
}
