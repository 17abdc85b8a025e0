// Numan Thabit 2025
//! Real time API latency analyzer: drives each configured endpoint at a
//! constant request rate, records the full latency distribution and reports
//! whether the 99th percentile stays under the 30ms real-time bar.

/// Constant-rate HTTP load generator.
pub mod attack;
/// Command-line surface of the `rtapi` binary.
pub mod cli;
/// Endpoint records, defaults and input loading.
pub mod config;
pub mod error;
/// Percentile-vs-latency plot.
pub mod graph;
/// Latency statistics of one run.
pub mod metrics;
/// Endpoint to metrics adapter over the load generator.
pub mod probe;
pub mod progress;
/// Text, JSON, PDF and forwarding emitters.
pub mod report;
/// Sequential execution of all endpoints.
pub mod runner;

pub use config::{EndpointSpec, InputSource, QueryParameters, SplunkSettings, Target};
pub use error::{ConfigError, EngineError, Error, ForwardError, RenderError, Result};
pub use metrics::{Metrics, MetricsBuilder};
pub use probe::{HttpProber, Prober};
pub use runner::Runner;
