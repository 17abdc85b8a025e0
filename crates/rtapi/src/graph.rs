// Numan Thabit 2025
//! Percentile-vs-latency graph.
//!
//! Percentile `p` is plotted at `x = 100 / (100 - p)` on a log axis, so 90%,
//! 99% and 99.9% land on consecutive decades. Latency is linear in
//! milliseconds. Fixed reference lines mark the 30ms real-time bar and the
//! 99th percentile.
use plotters::{coord::combinators::BindKeyPoints, prelude::*, series::DashedLineSeries};
use tracing::debug;

use crate::{config::EndpointSpec, error::RenderError};

pub const REAL_TIME_THRESHOLD_MS: f64 = 30.0;
pub const Y_TICK_STEP_MS: f64 = 50.0;
pub const GRAPH_SIZE_PX: (u32, u32) = (1000, 1000);

pub const X_TICKS: [(f64, &str); 8] = [
    (1.0, "0%"),
    (10.0, "90%"),
    (100.0, "99%"),
    (1_000.0, "99.9%"),
    (10_000.0, "99.99%"),
    (100_000.0, "99.999%"),
    (1_000_000.0, "99.9999%"),
    (10_000_000.0, "99.99999%"),
];

/// Index 0 is reserved for the threshold annotations.
const PALETTE: [RGBColor; 7] = [
    RGBColor(238, 46, 47),
    RGBColor(0, 140, 72),
    RGBColor(24, 90, 169),
    RGBColor(244, 125, 35),
    RGBColor(102, 44, 145),
    RGBColor(162, 29, 33),
    RGBColor(180, 56, 148),
];

pub fn percentile_to_x(p: f64) -> f64 {
    100.0 / (100.0 - p)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub label: String,
}

pub fn x_ticks() -> Vec<Tick> {
    X_TICKS
        .iter()
        .map(|&(value, label)| Tick {
            value,
            label: label.to_string(),
        })
        .collect()
}

/// A label every 50ms from 0 up to `max_ms`, plus the real-time threshold.
pub fn y_ticks(max_ms: f64) -> Vec<Tick> {
    let mut ticks: Vec<Tick> = (0..)
        .map(|step| step as f64 * Y_TICK_STEP_MS)
        .take_while(|value| *value <= max_ms)
        .map(|value| Tick {
            value,
            label: format!("{value:.0}ms"),
        })
        .collect();
    ticks.push(Tick {
        value: REAL_TIME_THRESHOLD_MS,
        label: format!("Real-Time -- {REAL_TIME_THRESHOLD_MS:.0}ms"),
    });
    ticks
}

pub fn p99_label(p99_ms: f64) -> String {
    format!("{p99_ms:.3}ms @ 99%")
}

/// Extracts `(x, latency_ms)` points from an HDR plot report. The header line
/// is skipped; rows without exactly four fields, or with values that do not
/// parse to a finite point on the axis, are dropped.
pub fn parse_curve(plot: &str) -> Vec<(f64, f64)> {
    plot.lines()
        .skip(1)
        .filter_map(|row| {
            let fields: Vec<&str> = row.split_whitespace().collect();
            if fields.len() != 4 {
                debug!(row, "skipping malformed percentile row");
                return None;
            }
            let y = fields[0].parse::<f64>().ok()?;
            let x = fields[3].parse::<f64>().ok()?;
            (x.is_finite() && x >= 1.0 && y.is_finite()).then_some((x, y))
        })
        .collect()
}

/// One plotted endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub p99_ms: f64,
}

impl Series {
    /// `None` when the endpoint has not been probed yet.
    pub fn from_endpoint(endpoint: &EndpointSpec) -> Option<Self> {
        let metrics = endpoint.metrics.as_ref()?;
        let mut plot = Vec::new();
        metrics.write_hdr_plot(&mut plot).ok()?;
        Some(Self {
            label: endpoint.target.url.clone(),
            points: parse_curve(&String::from_utf8_lossy(&plot)),
            p99_ms: metrics.latencies.p99.as_secs_f64() * 1_000.0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Circle,
    Triangle,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SeriesStyle {
    color: RGBColor,
    marker: Marker,
    /// `(dash, gap)` in pixels; `None` draws a solid line.
    dashes: Option<(u32, u32)>,
}

/// Style for the `index`-th data series, skipping palette slot 0.
fn series_style(index: usize) -> SeriesStyle {
    let slot = index + 1;
    let markers = [Marker::Circle, Marker::Triangle, Marker::Cross];
    let dashes = [None, Some((12, 6)), Some((4, 4)), Some((16, 4))];
    SeriesStyle {
        color: PALETTE[1 + (slot - 1) % (PALETTE.len() - 1)],
        marker: markers[slot % markers.len()],
        dashes: dashes[slot % dashes.len()],
    }
}

/// Upper bound of the latency axis: headroom over the slowest point, rounded
/// up to the tick step.
fn y_axis_max(series: &[Series]) -> f64 {
    let highest = series
        .iter()
        .flat_map(|s| s.points.iter().map(|&(_, y)| y).chain([s.p99_ms]))
        .fold(REAL_TIME_THRESHOLD_MS, f64::max);
    ((highest * 1.1) / Y_TICK_STEP_MS).ceil().max(1.0) * Y_TICK_STEP_MS
}

fn x_tick_label(x: f64) -> String {
    X_TICKS
        .iter()
        .find(|(value, _)| (value - x).abs() <= value * 1e-9)
        .map(|(_, label)| label.to_string())
        .unwrap_or_default()
}

/// Rendered RGB8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

fn plot_error<E: std::fmt::Debug>(err: E) -> RenderError {
    RenderError::Plot(format!("{err:?}"))
}

/// Draws every series onto one fixed-size raster.
pub fn render(series: &[Series]) -> Result<Raster, RenderError> {
    let (width, height) = GRAPH_SIZE_PX;
    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    let y_max = y_axis_max(series);
    let x_min = X_TICKS[0].0;
    let x_max = X_TICKS[X_TICKS.len() - 1].0;
    let p99_x = percentile_to_x(99.0);
    let threshold = PALETTE[0];

    let y_axis = y_ticks(y_max);
    let y_label = |value: &f64| {
        y_axis
            .iter()
            .find(|tick| (tick.value - value).abs() < 1e-9)
            .map(|tick| tick.label.clone())
            .unwrap_or_default()
    };

    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(30)
            .x_label_area_size(80)
            .y_label_area_size(200)
            .build_cartesian_2d(
                (x_min..x_max)
                    .log_scale()
                    .with_key_points(X_TICKS.iter().map(|&(value, _)| value).collect()),
                (0f64..y_max).with_key_points(y_axis.iter().map(|tick| tick.value).collect()),
            )
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("Percentile (%)")
            .y_desc("Latency (ms)")
            .axis_desc_style(("sans-serif", 30))
            .label_style(("sans-serif", 18))
            .x_label_formatter(&|value| x_tick_label(*value))
            .y_label_formatter(&y_label)
            .draw()
            .map_err(plot_error)?;

        for (index, s) in series.iter().enumerate() {
            let style = series_style(index);
            let color = style.color;
            let line = color.stroke_width(2);
            let anno = match style.dashes {
                None => chart
                    .draw_series(LineSeries::new(s.points.clone(), line))
                    .map_err(plot_error)?,
                Some((dash, gap)) => chart
                    .draw_series(DashedLineSeries::new(s.points.clone(), dash, gap, line))
                    .map_err(plot_error)?,
            };
            anno.label(s.label.clone()).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 24, y)], color.stroke_width(2))
            });

            let marks = s.points.iter().copied();
            match style.marker {
                Marker::Circle => chart
                    .draw_series(marks.map(|p| Circle::new(p, 4, color.filled())))
                    .map_err(plot_error)?,
                Marker::Triangle => chart
                    .draw_series(marks.map(|p| TriangleMarker::new(p, 6, color.filled())))
                    .map_err(plot_error)?,
                Marker::Cross => chart
                    .draw_series(marks.map(|p| Cross::new(p, 5, color.stroke_width(2))))
                    .map_err(plot_error)?,
            };
        }

        for s in series {
            chart
                .draw_series(DashedLineSeries::new(
                    vec![(x_min, s.p99_ms), (p99_x, s.p99_ms)],
                    10,
                    6,
                    threshold.stroke_width(2),
                ))
                .map_err(plot_error)?;
            chart
                .draw_series(std::iter::once(Text::new(
                    p99_label(s.p99_ms),
                    (p99_x, s.p99_ms),
                    ("sans-serif", 20).into_font().color(&threshold),
                )))
                .map_err(plot_error)?;
        }

        chart
            .draw_series(DashedLineSeries::new(
                vec![(x_min, REAL_TIME_THRESHOLD_MS), (x_max, REAL_TIME_THRESHOLD_MS)],
                8,
                8,
                threshold.stroke_width(1),
            ))
            .map_err(plot_error)?;
        chart
            .draw_series(DashedLineSeries::new(
                vec![(p99_x, 0.0), (p99_x, y_max)],
                8,
                8,
                threshold.stroke_width(1),
            ))
            .map_err(plot_error)?;

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font(("sans-serif", 18))
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .draw()
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
    }

    Ok(Raster {
        width,
        height,
        pixels,
    })
}
