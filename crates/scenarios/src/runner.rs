//! Sequential scenario execution.

use std::time::Instant;

use qbridge_e2e_core::report::ScenarioResult;

use crate::buffer::BufferConsumption;
use crate::gateway::GatewaySubmission;
use crate::scenario::{Scenario, SystemEndpoints};
use crate::transport::TransportConnectivity;

/// Runs scenarios in order and records one [`ScenarioResult`] for each.
///
/// A failing scenario never stops the ones after it.
pub struct ScenarioRunner {
    scenarios: Vec<Box<dyn Scenario>>,
}

impl ScenarioRunner {
    pub fn new(scenarios: Vec<Box<dyn Scenario>>) -> Self {
        Self { scenarios }
    }

    /// Gateway submission, buffer consumption, transport connectivity.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(GatewaySubmission),
            Box::new(BufferConsumption),
            Box::new(TransportConnectivity),
        ])
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name()).collect()
    }

    pub async fn run_all(&self, endpoints: &SystemEndpoints) -> Vec<ScenarioResult> {
        let mut results = Vec::with_capacity(self.scenarios.len());
        self.run_into(endpoints, &mut results).await;
        results
    }

    /// Like [`run_all`](Self::run_all), but appends each result to `results`
    /// as soon as its scenario finishes. If the future is dropped midway the
    /// finished results stay in `results`.
    pub async fn run_into(&self, endpoints: &SystemEndpoints, results: &mut Vec<ScenarioResult>) {
        for scenario in &self.scenarios {
            let name = scenario.name();
            tracing::info!(scenario = name, "running scenario");
            let started = Instant::now();

            let result = match scenario.execute(endpoints).await {
                Ok(outcome) => {
                    let result = ScenarioResult::passed(
                        name,
                        outcome.diagnostic,
                        outcome.artifact,
                        started.elapsed(),
                    );
                    tracing::info!(scenario = name, elapsed_ms = result.elapsed().as_millis() as u64, "scenario passed");
                    result
                }
                Err(e) => {
                    tracing::error!(scenario = name, error = %e, "scenario failed");
                    ScenarioResult::failed(name, e.to_string(), started.elapsed())
                }
            };
            results.push(result);
        }
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_order_is_fixed() {
        let runner = ScenarioRunner::standard();
        assert_eq!(
            runner.names(),
            vec!["gateway_submission", "buffer_consumption", "transport_connectivity"]
        );
    }
}
