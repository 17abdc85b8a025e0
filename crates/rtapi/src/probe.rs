// Numan Thabit 2025
use std::{future::Future, time::Duration};

use humantime::format_duration;
use tracing::info;

use crate::{
    attack::{AttackOptions, AttackTarget, Attacker, DEFAULT_TIMEOUT},
    config::EndpointSpec,
    error::Result,
    metrics::{Metrics, MetricsBuilder},
};

/// Runs one endpoint to completion and returns its aggregate.
pub trait Prober {
    fn probe(&self, endpoint: &EndpointSpec) -> impl Future<Output = Result<Metrics>> + Send;
}

/// Probes endpoints over the network with [`Attacker`].
#[derive(Debug, Clone)]
pub struct HttpProber {
    timeout: Duration,
}

impl Default for HttpProber {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HttpProber {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Prober for HttpProber {
    async fn probe(&self, endpoint: &EndpointSpec) -> Result<Metrics> {
        let duration = endpoint.validate()?;
        let target = &endpoint.target;
        let query = &endpoint.query;

        let attack_target = AttackTarget::new(
            &target.method,
            &target.url,
            target.body.clone(),
            &target.header,
        )?;
        let attacker = Attacker::new(AttackOptions {
            workers: query.threads,
            max_workers: query.max_threads,
            connections: query.connections,
            rate: query.request_rate,
            duration,
            timeout: self.timeout,
        })?;

        info!(
            method = %target.method,
            url = %target.url,
            rate = query.request_rate,
            duration = %format_duration(duration),
            "starting run"
        );

        let mut builder = MetricsBuilder::new()?;
        let mut attack = attacker.attack(attack_target);
        while let Some(outcome) = attack.recv().await {
            builder.add(&outcome);
        }
        attack.join().await?;
        let metrics = builder.finish();

        info!(
            url = %target.url,
            requests = metrics.requests,
            successes = metrics.successes,
            rate = metrics.rate,
            p99 = %format_duration(metrics.latencies.p99),
            "run complete"
        );
        Ok(metrics)
    }
}
