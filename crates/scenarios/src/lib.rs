//! Black-box scenarios run against the started qbridge services.
//!
//! Each scenario talks to one service through its public interface only:
//! HTTP for the gateway, the captured log for the buffer and Arrow Flight for
//! the transport. [`ScenarioRunner`] runs them in a fixed order.

pub mod buffer;
pub mod gateway;
pub mod runner;
pub mod scenario;
pub mod transport;

pub use buffer::BufferConsumption;
pub use gateway::GatewaySubmission;
pub use runner::ScenarioRunner;
pub use scenario::{Scenario, ScenarioOutcome, SystemEndpoints};
pub use transport::TransportConnectivity;

/// Number of scenarios in the standard suite.
pub const STANDARD_SCENARIO_COUNT: usize = 3;
