// Numan Thabit 2025
use std::time::Duration;

use chrono::Utc;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::Serialize;
use tracing::info;

use crate::{
    config::{EndpointSpec, SplunkSettings},
    error::ForwardError,
};

const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Event envelope accepted by the log-aggregation sink.
#[derive(Debug, Serialize)]
pub struct ForwardEvent<'a> {
    /// Unix seconds.
    pub time: i64,
    pub host: &'a str,
    pub source: &'a str,
    pub event: &'a EndpointSpec,
}

/// Posts one event per endpoint to the configured sink.
pub struct Forwarder {
    client: Client,
    settings: SplunkSettings,
    host: String,
}

impl Forwarder {
    pub fn new(settings: SplunkSettings) -> Result<Self, ForwardError> {
        let host = gethostname::gethostname()
            .into_string()
            .map_err(|_| ForwardError::Hostname)?;
        Self::with_host(settings, host)
    }

    pub fn with_host(settings: SplunkSettings, host: String) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .build()
            .map_err(ForwardError::Client)?;
        Ok(Self {
            client,
            settings,
            host,
        })
    }

    /// Forwards endpoints in order; the first failure stops the rest.
    pub async fn forward_all(&self, endpoints: &[EndpointSpec]) -> Result<(), ForwardError> {
        for endpoint in endpoints {
            self.forward(endpoint).await?;
        }
        Ok(())
    }

    pub async fn forward(&self, endpoint: &EndpointSpec) -> Result<(), ForwardError> {
        let event = ForwardEvent {
            time: Utc::now().timestamp(),
            host: &self.host,
            source: &self.settings.source,
            event: endpoint,
        };
        let url = &self.settings.url;
        let request_error = |source| ForwardError::Request {
            endpoint: endpoint.target.url.clone(),
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .post(url.as_str())
            .header(AUTHORIZATION, self.settings.authkey.as_str())
            .header(CONTENT_TYPE, "application/json")
            .json(&event)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(request_error)?;

        if !status.is_success() {
            return Err(ForwardError::Status {
                endpoint: endpoint.target.url.clone(),
                url: url.clone(),
                status,
                body,
            });
        }
        info!(endpoint = %endpoint.target.url, status = %status, response = %body, "event forwarded");
        Ok(())
    }
}
