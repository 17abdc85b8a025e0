// Numan Thabit 2025
//! Latency statistics for one run: an O(1) fold over request outcomes that is
//! frozen into an immutable [`Metrics`] value.
use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Cursor, Write},
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hdrhistogram::{
    serialization::{Deserializer as HistogramDeserializer, Serializer as _, V2Serializer},
    Histogram,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{serde_as, DurationNanoSeconds};

use crate::{attack::Outcome, error::EngineError};

/// Highest latency the histogram tracks exactly; slower requests saturate.
const MAX_TRACKABLE_NANOS: u64 = 3_600 * 1_000_000_000;
const SIGNIFICANT_DIGITS: u8 = 3;
/// Largest `1/(1-q)` emitted by the plot reporter.
const MAX_PLOT_X: f64 = 10_000_000.0;

#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub total: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub mean: Duration,
    #[serde(rename = "50th")]
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p50: Duration,
    #[serde(rename = "90th")]
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p90: Duration,
    #[serde(rename = "95th")]
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p95: Duration,
    #[serde(rename = "99th")]
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p99: Duration,
    #[serde(rename = "99.9th")]
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p999: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub max: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub min: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ByteMetrics {
    pub total: u64,
    pub mean: f64,
}

/// Finalized statistics of one run. Has no mutators; build it with
/// [`MetricsBuilder`].
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub latencies: LatencyMetrics,
    pub bytes_in: ByteMetrics,
    pub bytes_out: ByteMetrics,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub duration: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub wait: Duration,
    pub requests: u64,
    pub successes: u64,
    pub rate: f64,
    pub throughput: f64,
    pub success: f64,
    pub status_codes: BTreeMap<String, u64>,
    pub errors: BTreeMap<String, u64>,
    histogram: LatencyHistogram,
}

impl Metrics {
    /// Latency at percentile `p` (0..=100), clamped to the observed range.
    pub fn percentile(&self, p: f64) -> Duration {
        self.histogram
            .quantile(p)
            .clamp(self.latencies.min, self.latencies.max)
    }

    pub fn errored(&self) -> u64 {
        self.requests - self.successes
    }

    /// Writes the human-readable run summary.
    pub fn write_text<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let l = &self.latencies;
        writeln!(
            w,
            "Requests      [total, rate, throughput]               {}, {:.2}, {:.2}",
            self.requests, self.rate, self.throughput
        )?;
        writeln!(
            w,
            "Duration      [total, attack, wait]                   {}, {}, {}",
            Nanos(self.duration + self.wait),
            Nanos(self.duration),
            Nanos(self.wait)
        )?;
        writeln!(
            w,
            "Latencies     [min, mean, 50, 90, 95, 99, 99.9, max]  {}, {}, {}, {}, {}, {}, {}, {}",
            Nanos(l.min),
            Nanos(l.mean),
            Nanos(l.p50),
            Nanos(l.p90),
            Nanos(l.p95),
            Nanos(l.p99),
            Nanos(l.p999),
            Nanos(l.max)
        )?;
        writeln!(
            w,
            "Bytes In      [total, mean]                           {}, {:.2}",
            self.bytes_in.total, self.bytes_in.mean
        )?;
        writeln!(
            w,
            "Bytes Out     [total, mean]                           {}, {:.2}",
            self.bytes_out.total, self.bytes_out.mean
        )?;
        writeln!(
            w,
            "Success       [ratio]                                 {:.2}%",
            self.success * 100.0
        )?;
        let codes = self
            .status_codes
            .iter()
            .map(|(code, count)| format!("{code}:{count}"))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(
            w,
            "Status Codes  [code:count]                            {codes}"
        )?;
        writeln!(w, "Error Set:")?;
        for error in self.errors.keys() {
            writeln!(w, "{error}")?;
        }
        Ok(())
    }

    /// Writes the percentile curve as whitespace-separated rows:
    /// `Value(ms) Percentile TotalCount 1/(1-Percentile)`, preceded by a
    /// header line.
    pub fn write_hdr_plot<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{:>14}  {:>12}  {:>12}  {:>20}",
            "Value(ms)", "Percentile", "TotalCount", "1/(1-Percentile)"
        )?;
        let total = self.requests as f64;
        for q in plot_quantiles() {
            let value_ms = self.percentile(q).as_secs_f64() * 1_000.0;
            let fraction = q / 100.0;
            let count = (fraction * total) as u64;
            let one_by = 1.0 / (1.0 - fraction);
            writeln!(w, "{value_ms:>14.6}  {fraction:>12.6}  {count:>12}  {one_by:>20.6}")?;
        }
        Ok(())
    }
}

/// Quantiles of the plot reporter: `0`, then halving the remaining gap to
/// 100 until `1/(1-q)` would exceed `MAX_PLOT_X`, then `100`.
pub fn plot_quantiles() -> Vec<f64> {
    let mut quantiles = vec![0.0];
    let mut gap = 50.0_f64;
    while 100.0 / gap <= MAX_PLOT_X {
        quantiles.push(100.0 - gap);
        gap /= 2.0;
    }
    quantiles.push(100.0);
    quantiles
}

/// Mutable accumulator for one run.
#[derive(Debug, Clone)]
pub struct MetricsBuilder {
    histogram: Histogram<u64>,
    requests: u64,
    successes: u64,
    latency_total: Duration,
    latency_min: Option<Duration>,
    latency_max: Duration,
    bytes_in: u64,
    bytes_out: u64,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    status_codes: BTreeMap<String, u64>,
    errors: BTreeMap<String, u64>,
}

impl MetricsBuilder {
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            histogram: Histogram::new_with_bounds(1, MAX_TRACKABLE_NANOS, SIGNIFICANT_DIGITS)?,
            requests: 0,
            successes: 0,
            latency_total: Duration::ZERO,
            latency_min: None,
            latency_max: Duration::ZERO,
            bytes_in: 0,
            bytes_out: 0,
            earliest: None,
            latest: None,
            end: None,
            status_codes: BTreeMap::new(),
            errors: BTreeMap::new(),
        })
    }

    pub fn add(&mut self, outcome: &Outcome) {
        self.requests += 1;
        if outcome.is_success() {
            self.successes += 1;
        }

        let latency = outcome.latency;
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(nanos);
        self.latency_total = self.latency_total.saturating_add(latency);
        self.latency_min = Some(self.latency_min.map_or(latency, |min| min.min(latency)));
        self.latency_max = self.latency_max.max(latency);

        self.bytes_in += outcome.bytes_in;
        self.bytes_out += outcome.bytes_out;

        let started = outcome.timestamp;
        let finished = started
            + chrono::Duration::from_std(latency).unwrap_or_else(|_| chrono::Duration::zero());
        self.earliest = Some(self.earliest.map_or(started, |t| t.min(started)));
        self.latest = Some(self.latest.map_or(started, |t| t.max(started)));
        self.end = Some(self.end.map_or(finished, |t| t.max(finished)));

        *self
            .status_codes
            .entry(outcome.code.to_string())
            .or_insert(0) += 1;
        if let Some(error) = &outcome.error {
            *self.errors.entry(error.clone()).or_insert(0) += 1;
        }
    }

    /// Freezes the accumulator. Percentile queries are only available on the
    /// returned value.
    pub fn finish(self) -> Metrics {
        let earliest = self.earliest.unwrap_or_default();
        let latest = self.latest.unwrap_or(earliest);
        let end = self.end.unwrap_or(latest);
        let duration = (latest - earliest).to_std().unwrap_or_default();
        let wait = (end - latest).to_std().unwrap_or_default();

        let requests = self.requests;
        let min = self.latency_min.unwrap_or_default();
        let max = self.latency_max;
        let mean = if requests == 0 {
            Duration::ZERO
        } else {
            let nanos = self.latency_total.as_nanos() / u128::from(requests);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };

        let histogram = LatencyHistogram(self.histogram);
        let at = |p: f64| histogram.quantile(p).clamp(min, max);
        let latencies = LatencyMetrics {
            total: self.latency_total,
            mean,
            p50: at(50.0),
            p90: at(90.0),
            p95: at(95.0),
            p99: at(99.0),
            p999: at(99.9),
            max,
            min,
        };

        let per_request = |total: u64| {
            if requests == 0 {
                0.0
            } else {
                total as f64 / requests as f64
            }
        };
        let per_second = |count: u64, span: Duration| {
            let secs = span.as_secs_f64();
            if secs > 0.0 {
                count as f64 / secs
            } else {
                0.0
            }
        };

        Metrics {
            latencies,
            bytes_in: ByteMetrics {
                total: self.bytes_in,
                mean: per_request(self.bytes_in),
            },
            bytes_out: ByteMetrics {
                total: self.bytes_out,
                mean: per_request(self.bytes_out),
            },
            earliest,
            latest,
            end,
            duration,
            wait,
            requests,
            successes: self.successes,
            rate: per_second(requests, duration),
            throughput: per_second(self.successes, duration + wait),
            success: if requests == 0 {
                0.0
            } else {
                self.successes as f64 / requests as f64
            },
            status_codes: self.status_codes,
            errors: self.errors,
            histogram,
        }
    }
}

/// HDR histogram of latencies in nanoseconds; serialized as base64 V2.
#[derive(Debug, Clone, PartialEq)]
struct LatencyHistogram(Histogram<u64>);

impl LatencyHistogram {
    fn quantile(&self, p: f64) -> Duration {
        let q = (p / 100.0).clamp(0.0, 1.0);
        Duration::from_nanos(self.0.value_at_quantile(q))
    }
}

impl Serialize for LatencyHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut buf = Vec::new();
        V2Serializer::new()
            .serialize(&self.0, &mut buf)
            .map_err(|err| serde::ser::Error::custom(format!("histogram: {err:?}")))?;
        serializer.serialize_str(&STANDARD.encode(buf))
    }
}

impl<'de> Deserialize<'de> for LatencyHistogram {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let raw = STANDARD
            .decode(encoded.as_bytes())
            .map_err(de::Error::custom)?;
        let histogram = HistogramDeserializer::new()
            .deserialize(&mut Cursor::new(raw))
            .map_err(|err| de::Error::custom(format!("histogram: {err:?}")))?;
        Ok(Self(histogram))
    }
}

/// Compact duration rendering for the text report.
struct Nanos(Duration);

impl fmt::Display for Nanos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0.as_nanos();
        if nanos < 1_000 {
            write!(f, "{nanos}ns")
        } else if nanos < 1_000_000 {
            write!(f, "{:.3}µs", nanos as f64 / 1e3)
        } else if nanos < 1_000_000_000 {
            write!(f, "{:.3}ms", nanos as f64 / 1e6)
        } else {
            write!(f, "{:.3}s", nanos as f64 / 1e9)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn outcome(seq: u64, latency_ms: u64, code: u16) -> Outcome {
        let error = if (200..400).contains(&code) {
            None
        } else if code == 0 {
            Some("connection refused".to_string())
        } else {
            Some(format!("{code} Server Error"))
        };
        Outcome {
            seq,
            timestamp: DateTime::<Utc>::default() + chrono::Duration::milliseconds(seq as i64 * 10),
            latency: Duration::from_millis(latency_ms),
            bytes_in: 100,
            bytes_out: 20,
            code,
            error,
        }
    }

    /// Synthetic finished aggregate with latencies `1..=n` milliseconds.
    pub(crate) fn linear_metrics(n: u64) -> Metrics {
        let mut builder = MetricsBuilder::new().expect("histogram");
        for i in 1..=n {
            builder.add(&outcome(i, i, 200));
        }
        builder.finish()
    }

    #[test]
    fn summary_percentiles_are_ordered() {
        let metrics = linear_metrics(1_000);
        let l = &metrics.latencies;
        assert!(l.min <= l.p50);
        assert!(l.p50 <= l.p90);
        assert!(l.p90 <= l.p95);
        assert!(l.p95 <= l.p99);
        assert!(l.p99 <= l.p999);
        assert!(l.p999 <= l.max);
        assert!(l.min <= l.mean && l.mean <= l.max);
        assert_eq!(l.min, Duration::from_millis(1));
        assert_eq!(l.max, Duration::from_millis(1_000));
    }

    #[test]
    fn percentiles_have_bounded_relative_error() {
        let metrics = linear_metrics(1_000);
        for (p, expected_ms) in [(50.0, 500.0), (90.0, 900.0), (99.0, 990.0)] {
            let got = metrics.percentile(p).as_secs_f64() * 1_000.0;
            assert!(
                (got - expected_ms).abs() / expected_ms < 0.01,
                "p{p}: got {got}ms, expected ~{expected_ms}ms"
            );
        }
    }

    #[test]
    fn arbitrary_percentile_queries_are_monotonic() {
        let mut builder = MetricsBuilder::new().expect("histogram");
        for (i, ms) in [3, 7, 1, 250, 12, 12, 40, 2, 900, 5].into_iter().enumerate() {
            builder.add(&outcome(i as u64, ms, 200));
        }
        let metrics = builder.finish();
        let mut previous = Duration::ZERO;
        for q in plot_quantiles() {
            let value = metrics.percentile(q);
            assert!(value >= previous, "p{q} decreased");
            assert!(value <= metrics.latencies.max);
            previous = value;
        }
    }

    #[test]
    fn counts_split_successes_and_errors() {
        let mut builder = MetricsBuilder::new().expect("histogram");
        builder.add(&outcome(0, 5, 200));
        builder.add(&outcome(1, 5, 302));
        builder.add(&outcome(2, 5, 503));
        builder.add(&outcome(3, 5, 0));
        let metrics = builder.finish();
        assert_eq!(metrics.requests, 4);
        assert_eq!(metrics.successes, 2);
        assert_eq!(metrics.errored(), 2);
        assert_eq!(metrics.status_codes["0"], 1);
        assert_eq!(metrics.status_codes["503"], 1);
        assert_eq!(metrics.errors["connection refused"], 1);
        assert!((metrics.success - 0.5).abs() < f64::EPSILON);
        assert_eq!(metrics.bytes_in.total, 400);
        assert!((metrics.bytes_out.mean - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn timing_window_spans_first_start_to_last_completion() {
        let metrics = linear_metrics(3);
        // starts at 10ms, 20ms, 30ms; the last one takes 3ms
        assert_eq!(metrics.duration, Duration::from_millis(20));
        assert_eq!(metrics.wait, Duration::from_millis(3));
        assert!((metrics.rate - 150.0).abs() < 1e-9);
    }

    #[test]
    fn empty_run_finishes_to_zeroes() {
        let metrics = MetricsBuilder::new().expect("histogram").finish();
        assert_eq!(metrics.requests, 0);
        assert_eq!(metrics.percentile(99.0), Duration::ZERO);
        assert_eq!(metrics.rate, 0.0);
        assert_eq!(metrics.success, 0.0);
    }

    #[test]
    fn serde_roundtrip_keeps_percentile_queries() {
        let metrics = linear_metrics(500);
        let encoded = serde_json::to_string(&metrics).expect("serialize");
        assert!(encoded.contains("\"99th\""));
        let decoded: Metrics = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, metrics);
        assert_eq!(decoded.percentile(75.0), metrics.percentile(75.0));
    }

    #[test]
    fn text_report_lists_summary_lines() {
        let mut builder = MetricsBuilder::new().expect("histogram");
        builder.add(&outcome(0, 12, 200));
        builder.add(&outcome(1, 30, 500));
        let mut out = Vec::new();
        builder.finish().write_text(&mut out).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("Requests      [total, rate, throughput]"));
        assert!(text.contains("Status Codes  [code:count]"));
        assert!(text.contains("200:1  500:1"));
        assert!(text.contains("50.00%"));
        assert!(text.trim_end().ends_with("500 Server Error"));
    }

    #[test]
    fn hdr_plot_has_header_and_four_columns() {
        let metrics = linear_metrics(100);
        let mut out = Vec::new();
        metrics.write_hdr_plot(&mut out).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let mut lines = text.lines();
        assert!(lines.next().expect("header").contains("1/(1-Percentile)"));
        let rows: Vec<_> = lines.collect();
        assert_eq!(rows.len(), plot_quantiles().len());
        assert!(rows.iter().all(|row| row.split_whitespace().count() == 4));
        let first: Vec<_> = rows[0].split_whitespace().collect();
        assert_eq!(first[3], "1.000000");
    }

    #[test]
    fn plot_quantiles_stop_at_ten_million() {
        let quantiles = plot_quantiles();
        assert_eq!(quantiles[..4], [0.0, 50.0, 75.0, 87.5]);
        assert_eq!(*quantiles.last().expect("last"), 100.0);
        let finite_max = quantiles[quantiles.len() - 2];
        assert!(1.0 / (1.0 - finite_max / 100.0) <= MAX_PLOT_X * (1.0 + 1e-9));
    }
}
