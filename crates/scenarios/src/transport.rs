//! Transport connectivity: fetch a ticket over Arrow Flight and count rows.

use arrow_flight::{FlightClient, Ticket};
use futures::TryStreamExt;
use tonic::transport::Endpoint;

use qbridge_e2e_core::BoxFuture;
use qbridge_e2e_core::config::TransportConfig;
use qbridge_e2e_core::error::{E2eError, VerificationError};

use crate::scenario::{Scenario, ScenarioOutcome, SystemEndpoints};

/// Opens a Flight client to the transport service, calls `DoGet` with the
/// configured ticket and compares the total row count of every returned
/// record batch with the expected count.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportConnectivity;

impl TransportConnectivity {
    pub const NAME: &'static str = "transport_connectivity";

    async fn verify(config: &TransportConfig) -> Result<ScenarioOutcome, VerificationError> {
        let address = config.endpoint();
        let timeout = config.timeout();

        let channel = Endpoint::from_shared(address.clone())
            .map_err(|e| VerificationError::TransportConnect {
                address: address.clone(),
                reason: e.to_string(),
            })?
            .connect_timeout(timeout)
            .timeout(timeout)
            .connect()
            .await
            .map_err(|e| VerificationError::TransportConnect {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        let mut client = FlightClient::new(channel);
        let fetch = async {
            let mut stream = client
                .do_get(Ticket::new(config.ticket.clone()))
                .await
                .map_err(|e| VerificationError::TransportStream(e.to_string()))?;

            let mut rows: u64 = 0;
            let mut batches: u64 = 0;
            while let Some(batch) = stream
                .try_next()
                .await
                .map_err(|e| VerificationError::TransportStream(e.to_string()))?
            {
                batches += 1;
                rows += batch.num_rows() as u64;
            }
            Ok::<_, VerificationError>((rows, batches))
        };

        let (rows, batches) = tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| {
                VerificationError::TransportStream(format!("DoGet did not finish within {timeout:?}"))
            })??;

        tracing::info!(address = %address, rows, batches, "transport stream read");
        if rows != config.expected_rows {
            return Err(VerificationError::RowCountMismatch {
                expected: config.expected_rows,
                actual: rows,
            });
        }
        Ok(ScenarioOutcome::new(format!(
            "DoGet '{}' returned {rows} row(s) in {batches} batch(es)",
            config.ticket
        )))
    }
}

impl Scenario for TransportConnectivity {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute<'a>(
        &'a self,
        endpoints: &'a SystemEndpoints,
    ) -> BoxFuture<'a, Result<ScenarioOutcome, E2eError>> {
        Box::pin(async move {
            Self::verify(&endpoints.transport)
                .await
                .map_err(E2eError::from)
        })
    }
}
