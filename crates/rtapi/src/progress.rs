// Numan Thabit 2025
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::{
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};

const TICK: Duration = Duration::from_millis(100);

/// Cosmetic progress bar that fills against an estimated total run time.
/// It only reads the clock; it never gates the runs.
pub struct ProgressTicker {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn spawn(estimate: Duration) -> Self {
        let steps = ticks_for(estimate);
        let bar = ProgressBar::new(steps);
        let style = ProgressStyle::with_template("{elapsed_precise} [{bar:40}] {percent:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        let ticking = bar.clone();
        let task = tokio::spawn(async move {
            let began = Instant::now();
            let mut ticker = interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let position = position_at(began.elapsed(), steps);
                ticking.set_position(position);
                if position >= steps {
                    break;
                }
            }
        });
        Self { bar, task }
    }

    pub fn finish(self) {
        self.task.abort();
        self.bar.finish();
    }
}

fn ticks_for(estimate: Duration) -> u64 {
    (estimate.as_millis() / TICK.as_millis()) as u64
}

fn position_at(elapsed: Duration, steps: u64) -> u64 {
    ticks_for(elapsed).min(steps)
}
