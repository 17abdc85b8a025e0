// Numan Thabit 2025
//! Sequential execution of every configured endpoint.
use std::time::Duration;

use humantime::format_duration;
use tracing::info;

use crate::{
    config::EndpointSpec,
    error::{ConfigError, Result},
    probe::Prober,
    progress::ProgressTicker,
};

pub struct Runner<P> {
    prober: P,
    show_progress: bool,
}

impl<P: Prober> Runner<P> {
    pub fn new(prober: P) -> Self {
        Self {
            prober,
            show_progress: false,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Probes the endpoints one at a time, in input order, attaching each
    /// run's metrics before the next run starts. Every endpoint is validated
    /// before the first request is sent.
    pub async fn run(&self, mut endpoints: Vec<EndpointSpec>) -> Result<Vec<EndpointSpec>> {
        let estimate = estimate_total(&endpoints)?;
        info!(
            endpoints = endpoints.len(),
            estimate = %format_duration(estimate),
            "rtapi will take {} seconds to run",
            estimate.as_secs()
        );

        let ticker = self
            .show_progress
            .then(|| ProgressTicker::spawn(estimate));
        let outcome = self.probe_all(&mut endpoints).await;
        if let Some(ticker) = ticker {
            ticker.finish();
        }
        outcome.map(|()| endpoints)
    }

    async fn probe_all(&self, endpoints: &mut [EndpointSpec]) -> Result<()> {
        for endpoint in endpoints.iter_mut() {
            let metrics = self.prober.probe(endpoint).await?;
            endpoint.metrics = Some(metrics);
        }
        Ok(())
    }
}

/// Sum of all run durations; fails on the first invalid endpoint.
pub fn estimate_total(endpoints: &[EndpointSpec]) -> std::result::Result<Duration, ConfigError> {
    endpoints
        .iter()
        .try_fold(Duration::ZERO, |total, endpoint| {
            Ok(total + endpoint.validate()?)
        })
}
