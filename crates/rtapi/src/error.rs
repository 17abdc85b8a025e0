// Numan Thabit 2025
use std::{io, path::PathBuf};

use thiserror::Error;

/// Umbrella error for a single `rtapi` invocation. Every variant is fatal.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Forward(#[from] ForwardError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Bad, missing or contradictory user input. Always raised before any
/// network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no input data found: pass --file or --data")]
    NoInput,
    #[error("use either --file or --data as the input source, not both")]
    ConflictingInput,
    #[error("no output selected: pass --output, --print, --json or --splunk")]
    NoOutput,
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unsupported input format for {} (expected .json, .yml or .yaml)", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML input: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("endpoint {url}: invalid duration '{value}': {source}")]
    InvalidDuration {
        url: String,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("endpoint {url}: duration '{value}' must be greater than zero")]
    EmptyDuration { url: String, value: String },
    #[error("endpoint {url}: threads ({threads}) must not exceed max_threads ({max_threads})")]
    ThreadBounds {
        url: String,
        threads: u64,
        max_threads: u64,
    },
    #[error("endpoint {url}: max_threads must be at least 1")]
    NoWorkers { url: String },
}

/// The load-generation engine could not start a run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to allocate latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
    #[error("attack task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Plot or document generation failed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("graph rendering failed: {0}")]
    Plot(String),
    #[error("pdf generation failed: {0}")]
    Pdf(String),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("report output failed: {0}")]
    Io(#[from] io::Error),
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Forwarding one event to the log-aggregation sink failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build forwarding client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to send event for {endpoint} to {url}: {source}")]
    Request {
        endpoint: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("sink {url} rejected event for {endpoint} with status {status}: {body}")]
    Status {
        endpoint: String,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("local host name is not valid UTF-8")]
    Hostname,
}
