// Numan Thabit 2025
//! Report emitters over the enriched endpoint list. Each emitter only reads
//! the endpoints; `main` runs them in a fixed order.
pub mod forward;
pub mod json;
pub mod pdf;
pub mod text;

pub use forward::{ForwardEvent, Forwarder};
pub use json::write_json;
pub use pdf::write_pdf;
pub use text::write_text;

use crate::{config::EndpointSpec, graph::REAL_TIME_THRESHOLD_MS};

pub const TITLE: &str = "Real Time API Latency Report";

pub const PREAMBLE: &str = "An API is considered real time when 99% of its responses arrive \
within 30 milliseconds. Averages hide the slow tail that users actually notice, so this report \
looks at the full latency distribution of every endpoint under a constant request rate and \
checks the 99th percentile against that bar.";

pub const METHOD: &str = "Each endpoint was driven at a fixed request rate for a fixed duration. \
Every response time was recorded in a high dynamic range histogram, so the reported \
percentiles hold across the whole range from the fastest to the slowest request. The graph \
plots latency against percentile on a logarithmic axis: each step to the right adds a nine \
(90%, 99%, 99.9%, ...).";

pub const CLOSING: &str = "Latency at high percentiles is driven by queueing, garbage \
collection pauses, connection setup and slow dependencies. Endpoints that miss the bar \
should be profiled under the same load before tuning averages.";

/// Whether the endpoint's measured p99 is within the real-time bar.
/// `None` for endpoints that were never probed.
pub fn meets_real_time(endpoint: &EndpointSpec) -> Option<bool> {
    let metrics = endpoint.metrics.as_ref()?;
    Some(metrics.latencies.p99.as_secs_f64() * 1_000.0 <= REAL_TIME_THRESHOLD_MS)
}

/// One-line verdict for an endpoint.
pub fn verdict(endpoint: &EndpointSpec) -> String {
    let url = &endpoint.target.url;
    match (&endpoint.metrics, meets_real_time(endpoint)) {
        (Some(metrics), Some(meets)) => format!(
            "{url}: p99 {:.3}ms {} the {REAL_TIME_THRESHOLD_MS:.0}ms real-time bar",
            metrics.latencies.p99.as_secs_f64() * 1_000.0,
            if meets { "meets" } else { "misses" },
        ),
        _ => format!("{url}: not measured"),
    }
}
