// Numan Thabit 2025
//! Endpoint configuration model and the resolver that fills unset query
//! parameters with fixed defaults.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_with::{formats::PreferMany, serde_as, OneOrMany};
use tracing::info;

use crate::{error::ConfigError, metrics::Metrics};

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_THREADS: u64 = 2;
pub const DEFAULT_MAX_THREADS: u64 = 2;
pub const DEFAULT_CONNECTIONS: usize = 10;
pub const DEFAULT_DURATION: &str = "10s";
pub const DEFAULT_REQUEST_RATE: u64 = 500;

/// One probe target plus its run parameters. `metrics` is attached once by
/// the runner after the endpoint has been probed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub target: Target,
    #[serde(rename = "query_parameters", default)]
    pub query: QueryParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde_as(as = "BTreeMap<_, OneOrMany<_, PreferMany>>")]
    #[serde(default)]
    pub header: BTreeMap<String, Vec<String>>,
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

/// Fully resolved run parameters. Deserializes through [`QueryOverrides`] so
/// that only absent fields receive defaults; explicit zeroes are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "QueryOverrides")]
pub struct QueryParameters {
    pub threads: u64,
    pub max_threads: u64,
    pub connections: usize,
    pub duration: String,
    pub request_rate: u64,
}

/// Input layer of the query parameters: `None` means "not specified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryOverrides {
    pub threads: Option<u64>,
    pub max_threads: Option<u64>,
    pub connections: Option<usize>,
    pub duration: Option<String>,
    pub request_rate: Option<u64>,
}

impl Default for QueryParameters {
    fn default() -> Self {
        QueryOverrides::default().into()
    }
}

impl From<QueryOverrides> for QueryParameters {
    fn from(overrides: QueryOverrides) -> Self {
        Self {
            threads: overrides.threads.unwrap_or(DEFAULT_THREADS),
            max_threads: overrides.max_threads.unwrap_or(DEFAULT_MAX_THREADS),
            connections: overrides.connections.unwrap_or(DEFAULT_CONNECTIONS),
            duration: overrides
                .duration
                .unwrap_or_else(|| DEFAULT_DURATION.to_string()),
            request_rate: overrides.request_rate.unwrap_or(DEFAULT_REQUEST_RATE),
        }
    }
}

impl QueryParameters {
    pub fn run_duration(&self) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(self.duration.trim())
    }
}

impl EndpointSpec {
    /// Checks the run parameters and returns the parsed run duration.
    pub fn validate(&self) -> Result<Duration, ConfigError> {
        let url = &self.target.url;
        let duration =
            self.query
                .run_duration()
                .map_err(|source| ConfigError::InvalidDuration {
                    url: url.clone(),
                    value: self.query.duration.clone(),
                    source,
                })?;
        if duration.is_zero() {
            return Err(ConfigError::EmptyDuration {
                url: url.clone(),
                value: self.query.duration.clone(),
            });
        }
        if self.query.max_threads == 0 {
            return Err(ConfigError::NoWorkers { url: url.clone() });
        }
        if self.query.threads > self.query.max_threads {
            return Err(ConfigError::ThreadBounds {
                url: url.clone(),
                threads: self.query.threads,
                max_threads: self.query.max_threads,
            });
        }
        Ok(duration)
    }
}

/// Log-aggregation sink the forward emitter posts events to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplunkSettings {
    pub url: String,
    pub authkey: String,
    #[serde(default)]
    pub source: String,
}

/// Where endpoint records are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Inline(String),
}

impl InputSource {
    pub fn from_parts(file: Option<PathBuf>, data: Option<String>) -> Result<Self, ConfigError> {
        match (file, data) {
            (None, None) => Err(ConfigError::NoInput),
            (Some(_), Some(_)) => Err(ConfigError::ConflictingInput),
            (Some(path), None) => Ok(Self::File(path)),
            (None, Some(data)) => Ok(Self::Inline(data)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Json,
    Yaml,
}

impl Encoding {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

fn decode<T: DeserializeOwned>(raw: &str, encoding: Encoding) -> Result<T, ConfigError> {
    match encoding {
        Encoding::Json => Ok(serde_json::from_str(raw)?),
        Encoding::Yaml => Ok(serde_yaml::from_str(raw)?),
    }
}

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let encoding = Encoding::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&raw, encoding)
}

/// Resolves the endpoint list, preserving input order.
pub fn load_endpoints(source: &InputSource) -> Result<Vec<EndpointSpec>, ConfigError> {
    let endpoints: Vec<EndpointSpec> = match source {
        InputSource::File(path) => read_file(path)?,
        InputSource::Inline(data) => decode(data, Encoding::Json)?,
    };
    log_summary(&endpoints);
    Ok(endpoints)
}

/// Loads sink settings from a `.json`/`.yml`/`.yaml` file, or parses `value`
/// as an inline JSON document when it does not name such a file.
pub fn load_splunk_settings(value: &str) -> Result<SplunkSettings, ConfigError> {
    let path = Path::new(value);
    if Encoding::from_path(path).is_some() {
        return read_file(path);
    }
    decode(value, Encoding::Json)
}

fn log_summary(endpoints: &[EndpointSpec]) {
    for (index, endpoint) in endpoints.iter().enumerate() {
        info!(
            index,
            method = %endpoint.target.method,
            url = %endpoint.target.url,
            threads = endpoint.query.threads,
            max_threads = endpoint.query.max_threads,
            connections = endpoint.query.connections,
            duration = %endpoint.query.duration,
            request_rate = endpoint.query.request_rate,
            "endpoint configuration"
        );
    }
}
