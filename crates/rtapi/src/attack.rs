// Numan Thabit 2025
//! Constant-rate HTTP load generator.
//!
//! A pacer ticks at the requested rate and hands each tick to a worker slot.
//! The pool starts with `workers` slots and grows one slot at a time, up to
//! `max_workers`, whenever a tick finds every slot busy; at the ceiling the
//! pacer waits for a slot to free up. Every request produces exactly one
//! [`Outcome`] on the result channel, failures included.
use std::{collections::BTreeMap, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, Url,
};
use tokio::{
    sync::{mpsc, OwnedSemaphorePermit, Semaphore, TryAcquireError},
    task::JoinHandle,
    time::{interval_at, Instant},
};
use tracing::debug;

use crate::error::EngineError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const RESULT_BUFFER: usize = 4_096;

/// Result of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub latency: Duration,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// HTTP status, or 0 when no response was received.
    pub code: u16,
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..400).contains(&self.code)
    }
}

/// A single static request, validated up front.
#[derive(Debug, Clone)]
pub struct AttackTarget {
    method: Method,
    url: Url,
    body: Bytes,
    headers: HeaderMap,
}

impl AttackTarget {
    pub fn new(
        method: &str,
        url: &str,
        body: impl Into<Bytes>,
        header: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, EngineError> {
        let method = if method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(method.as_bytes())
                .map_err(|_| EngineError::InvalidMethod(method.to_string()))?
        };

        let invalid_url = |reason: String| EngineError::InvalidUrl {
            url: url.to_string(),
            reason,
        };
        let parsed = Url::parse(url).map_err(|err| invalid_url(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid_url(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        if parsed.host_str().is_none() {
            return Err(invalid_url("missing host".to_string()));
        }

        let mut headers = HeaderMap::new();
        for (name, values) in header {
            let invalid = |reason: String| EngineError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let key =
                HeaderName::from_bytes(name.as_bytes()).map_err(|err| invalid(err.to_string()))?;
            for value in values {
                let value = HeaderValue::from_str(value).map_err(|err| invalid(err.to_string()))?;
                headers.append(key.clone(), value);
            }
        }

        Ok(Self {
            method,
            url: parsed,
            body: body.into(),
            headers,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[derive(Debug, Clone)]
pub struct AttackOptions {
    pub workers: u64,
    pub max_workers: u64,
    /// Idle keep-alive connections kept per host.
    pub connections: usize,
    /// Requests per second; 0 runs unthrottled on `max_workers` workers.
    pub rate: u64,
    pub duration: Duration,
    pub timeout: Duration,
}

impl Default for AttackOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            max_workers: 2,
            connections: 10,
            rate: 500,
            duration: Duration::from_secs(10),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct Attacker {
    client: Client,
    options: AttackOptions,
}

impl Attacker {
    pub fn new(options: AttackOptions) -> Result<Self, EngineError> {
        let client = Client::builder()
            .pool_max_idle_per_host(options.connections)
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .timeout(options.timeout)
            .build()
            .map_err(EngineError::Client)?;
        Ok(Self { client, options })
    }

    /// Starts the run in the background and returns the stream of outcomes.
    /// The stream ends once `duration` has elapsed and every in-flight
    /// request has completed.
    pub fn attack(&self, target: AttackTarget) -> Attack {
        let (tx, rx) = mpsc::channel(RESULT_BUFFER);
        let pacer = tokio::spawn(pace(
            self.client.clone(),
            Arc::new(target),
            self.options.clone(),
            tx,
        ));
        Attack { results: rx, pacer }
    }
}

/// A running attack.
pub struct Attack {
    results: mpsc::Receiver<Outcome>,
    pacer: JoinHandle<u64>,
}

impl Attack {
    pub async fn recv(&mut self) -> Option<Outcome> {
        self.results.recv().await
    }

    /// Waits for the pacer and returns the number of requests issued.
    pub async fn join(self) -> Result<u64, EngineError> {
        Ok(self.pacer.await?)
    }
}

async fn pace(
    client: Client,
    target: Arc<AttackTarget>,
    options: AttackOptions,
    tx: mpsc::Sender<Outcome>,
) -> u64 {
    let unthrottled = options.rate == 0;
    let mut pool = WorkerPool::new(options.workers, options.max_workers, unthrottled);
    let began = Instant::now();
    let mut ticker = tick_period(options.rate).map(|period| interval_at(began, period));

    let mut seq = 0u64;
    loop {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }
        if began.elapsed() >= options.duration {
            break;
        }
        let Some(permit) = pool.acquire().await else {
            break;
        };
        // acquire may have waited at the ceiling
        if began.elapsed() >= options.duration {
            break;
        }

        let client = client.clone();
        let target = Arc::clone(&target);
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = hit(&client, &target, seq).await;
            drop(permit);
            let _ = tx.send(outcome).await;
        });
        seq += 1;
    }

    debug!(
        requests = seq,
        workers = pool.size,
        url = %target.url,
        "pacer finished"
    );
    seq
}

/// Interval between requests; `None` when unthrottled. Never zero, so rates
/// beyond one request per nanosecond run at that ceiling.
fn tick_period(rate: u64) -> Option<Duration> {
    (rate > 0).then(|| Duration::from_secs_f64(1.0 / rate as f64).max(Duration::from_nanos(1)))
}

async fn hit(client: &Client, target: &AttackTarget, seq: u64) -> Outcome {
    let timestamp = Utc::now();
    let started = Instant::now();
    let request = client
        .request(target.method.clone(), target.url.clone())
        .headers(target.headers.clone())
        .body(target.body.clone());

    let (code, bytes_in, error) = match request.send().await {
        Ok(response) => {
            let status = response.status();
            let code = status.as_u16();
            match response.bytes().await {
                Ok(body) => {
                    let error = (!(200..400).contains(&code)).then(|| status.to_string());
                    (code, body.len() as u64, error)
                }
                Err(err) => (code, 0, Some(err.to_string())),
            }
        }
        Err(err) => (0, 0, Some(err.to_string())),
    };

    Outcome {
        seq,
        timestamp,
        latency: started.elapsed(),
        bytes_in,
        bytes_out: target.body.len() as u64,
        code,
        error,
    }
}

/// Worker slots that grow on demand up to a ceiling.
struct WorkerPool {
    slots: Arc<Semaphore>,
    size: u64,
    max: u64,
}

impl WorkerPool {
    fn new(workers: u64, max_workers: u64, unthrottled: bool) -> Self {
        let max = max_workers.max(1);
        let size = if unthrottled { max } else { workers.min(max) };
        Self {
            slots: Arc::new(Semaphore::new(size as usize)),
            size,
            max,
        }
    }

    async fn acquire(&mut self) -> Option<OwnedSemaphorePermit> {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => return Some(permit),
            Err(TryAcquireError::Closed) => return None,
            Err(TryAcquireError::NoPermits) => {}
        }
        if self.size < self.max {
            self.size += 1;
            self.slots.add_permits(1);
            debug!(workers = self.size, "growing worker pool");
        }
        Arc::clone(&self.slots).acquire_owned().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_headers() -> BTreeMap<String, Vec<String>> {
        BTreeMap::new()
    }

    #[test]
    fn target_accepts_valid_request() {
        let mut header = BTreeMap::new();
        header.insert(
            "X-Token".to_string(),
            vec!["a".to_string(), "b".to_string()],
        );
        let target = AttackTarget::new("POST", "https://example.com/v1", "{}", &header)
            .expect("valid target");
        assert_eq!(target.method, Method::POST);
        assert_eq!(target.headers.get_all("x-token").iter().count(), 2);
        assert_eq!(target.body.len(), 2);
    }

    #[test]
    fn empty_method_means_get() {
        let target =
            AttackTarget::new("", "http://localhost/", "", &no_headers()).expect("valid target");
        assert_eq!(target.method, Method::GET);
    }

    #[test]
    fn target_rejects_bad_inputs() {
        assert!(matches!(
            AttackTarget::new("GE T", "http://localhost/", "", &no_headers()),
            Err(EngineError::InvalidMethod(_))
        ));
        assert!(matches!(
            AttackTarget::new("GET", "localhost:8080", "", &no_headers()),
            Err(EngineError::InvalidUrl { .. })
        ));
        assert!(matches!(
            AttackTarget::new("GET", "ftp://localhost/", "", &no_headers()),
            Err(EngineError::InvalidUrl { .. })
        ));
        let mut header = BTreeMap::new();
        header.insert("Bad Header".to_string(), vec!["x".to_string()]);
        assert!(matches!(
            AttackTarget::new("GET", "http://localhost/", "", &header),
            Err(EngineError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn outcome_success_requires_2xx_or_3xx_without_error() {
        let mut outcome = Outcome {
            seq: 0,
            timestamp: Utc::now(),
            latency: Duration::from_millis(1),
            bytes_in: 0,
            bytes_out: 0,
            code: 204,
            error: None,
        };
        assert!(outcome.is_success());
        outcome.code = 404;
        assert!(!outcome.is_success());
        outcome.code = 200;
        outcome.error = Some("body read failed".into());
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn pool_grows_to_ceiling_then_blocks() {
        let mut pool = WorkerPool::new(1, 3, false);
        let mut held = Vec::new();
        for _ in 0..3 {
            held.push(pool.acquire().await.expect("permit"));
        }
        assert_eq!(pool.size, 3);
        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err(), "pool must not exceed max_workers");

        held.pop();
        let freed = tokio::time::timeout(Duration::from_millis(50), pool.acquire())
            .await
            .expect("slot freed");
        assert!(freed.is_some());
        assert_eq!(pool.size, 3);
    }

    #[test]
    fn unthrottled_pool_starts_at_ceiling() {
        let pool = WorkerPool::new(1, 8, true);
        assert_eq!(pool.size, 8);
        assert_eq!(pool.slots.available_permits(), 8);
    }

    #[test]
    fn tick_period_is_never_zero() {
        assert_eq!(tick_period(0), None);
        assert_eq!(tick_period(500), Some(Duration::from_millis(2)));
        assert_eq!(tick_period(u64::MAX), Some(Duration::from_nanos(1)));
        assert_eq!(tick_period(10_000_000_000), Some(Duration::from_nanos(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn extreme_rate_runs_to_completion() {
        let target = AttackTarget::new("GET", "http://127.0.0.1:1/", "", &no_headers())
            .expect("valid target");
        let attacker = Attacker::new(AttackOptions {
            rate: 10_000_000_000,
            duration: Duration::from_millis(50),
            timeout: Duration::from_secs(1),
            ..Default::default()
        })
        .expect("attacker");

        let mut attack = attacker.attack(target);
        let mut received = 0u64;
        while attack.recv().await.is_some() {
            received += 1;
        }
        let issued = attack.join().await.expect("pacer must not panic");
        assert_eq!(issued, received);
        assert!(issued > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn no_request_starts_after_duration_at_the_ceiling() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        // accepts but never answers, so the single worker stays busy
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let target = AttackTarget::new("GET", &format!("http://{addr}/"), "", &no_headers())
            .expect("valid target");
        let attacker = Attacker::new(AttackOptions {
            workers: 1,
            max_workers: 1,
            rate: 1_000,
            duration: Duration::from_millis(100),
            timeout: Duration::from_millis(300),
            ..Default::default()
        })
        .expect("attacker");

        let mut attack = attacker.attack(target);
        let mut outcomes = Vec::new();
        while let Some(outcome) = attack.recv().await {
            outcomes.push(outcome);
        }
        attack.join().await.expect("pacer");
        assert_eq!(outcomes.len(), 1, "only the first request fits in the window");
    }
}
