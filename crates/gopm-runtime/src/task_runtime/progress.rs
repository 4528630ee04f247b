//! Progress ticker for long-running generations.

use std::{future::Future, time::Duration};

use tokio::sync::watch;

/// Timing of the progress edits: tick cadence, the quiet window where no
/// edit is published, and the hard ceiling after which the ticker stops on
/// its own.
#[derive(Debug, Clone)]
pub struct ProgressTickerConfig {
    pub tick_interval_ms: u64,
    pub suppress_under_ms: u64,
    pub deadline_ms: u64,
}

impl Default for ProgressTickerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            suppress_under_ms: 10_000,
            deadline_ms: 120_000,
        }
    }
}

pub(super) fn render_progress(tick_count: u64, elapsed_secs: u64) -> String {
    let dots = ".".repeat(((tick_count % 3) + 1) as usize);
    format!("🧠 Still thinking{dots}\n\n_Processing for {elapsed_secs}s..._")
}

/// Publishes a progress edit on each tick outside the suppression window
/// until cancelled, the deadline passes, or an edit fails. Ticks inside the
/// window still advance the dot phase. Returns the number of edits
/// published.
pub(super) async fn run_progress_ticker<F, Fut>(
    config: ProgressTickerConfig,
    mut cancel_rx: watch::Receiver<bool>,
    mut edit: F,
) -> u64
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let started = tokio::time::Instant::now();
    let period = Duration::from_millis(config.tick_interval_ms.max(1));
    let mut interval = tokio::time::interval_at(started + period, period);
    let mut tick_count = 0_u64;
    let mut edits = 0_u64;

    loop {
        tokio::select! {
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                tick_count = tick_count.saturating_add(1);
                let elapsed_ms = started.elapsed().as_millis() as u64;
                if elapsed_ms >= config.deadline_ms {
                    break;
                }
                if elapsed_ms <= config.suppress_under_ms {
                    continue;
                }
                let body = render_progress(tick_count, elapsed_ms / 1_000);
                if let Err(error) = edit(body).await {
                    eprintln!("progress ticker: edit failed error={error:#}");
                    break;
                }
                edits = edits.saturating_add(1);
            }
        }
    }

    edits
}
