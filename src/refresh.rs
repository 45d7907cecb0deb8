use crate::fetch::{FetchError, ResponseFetcher};
use crate::response::ResponseTable;
use anyhow::{ensure, Result};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Errors tolerated in a row before the loop gives up.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// Renders the dashboard from a full table snapshot. Per-row problems are
/// the implementation's to report and skip; a returned error means the whole
/// render failed, which the loop logs and survives.
pub trait Visualizer {
    fn render(&mut self, table: &ResponseTable) -> Result<RenderSummary>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub charts: usize,
    pub skipped: usize,
    pub row_issues: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Stopped | Phase::Failed)
    }
}

/// Live view of a run, published at every tick for operator inspection.
#[derive(Clone, Debug)]
pub struct Status {
    pub phase: Phase,
    pub ticks: u64,
    pub row_count: usize,
    pub last_error: Option<String>,
}

/// Why a run ended. `Stopped` covers both an operator stop request and the
/// idle cutoff; `Failed` keeps the error that killed the run.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Stopped,
    Failed(FetchError),
}

impl Outcome {
    fn phase(&self) -> Phase {
        match self {
            Outcome::Completed => Phase::Completed,
            Outcome::Stopped => Phase::Stopped,
            Outcome::Failed(_) => Phase::Failed,
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub outcome: Outcome,
    /// Fetch attempts made (tick 0 included).
    pub ticks: u64,
    pub renders: u64,
    pub anomalies: u64,
    pub row_count: usize,
}

#[derive(Clone, Debug)]
pub struct RefreshConfig {
    pub interval: Duration,
    pub duration: Duration,
    /// Stop early once no new rows have arrived for this long. `None` means
    /// run out the full duration.
    pub idle_stop_after: Option<Duration>,
    pub max_consecutive_errors: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            duration: Duration::from_secs(60 * 60),
            idle_stop_after: None,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

/// Rows observed as of the last successful fetch. Owned exclusively by the
/// loop; never touched on a failed fetch.
struct FetchState {
    last_row_count: usize,
}

/// Operator handle: request a stop (honored at the next tick boundary) and
/// query the live status.
pub struct RefreshHandle {
    stop: watch::Sender<bool>,
    status: watch::Receiver<Status>,
}

impl RefreshHandle {
    pub fn request_stop(&self) {
        let _ = self.stop.send(true);
    }

    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }
}

/// Drives fetch → diff → render on fixed wall-clock tick boundaries
/// (`start + k*interval`, never "now + interval") for a bounded duration.
/// One logical thread of control; the only suspension point is the wait
/// between boundaries, and each fetch finishes before the next boundary is
/// considered.
pub struct RefreshLoop<F, V> {
    config: RefreshConfig,
    fetcher: F,
    visualizer: V,
    stop_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<Status>,
}

impl<F, V> RefreshLoop<F, V>
where
    F: ResponseFetcher,
    V: Visualizer,
{
    pub fn new(config: RefreshConfig, fetcher: F, visualizer: V) -> Result<(Self, RefreshHandle)> {
        ensure!(config.interval > Duration::ZERO, "interval must be positive");
        ensure!(config.duration > Duration::ZERO, "duration must be positive");
        ensure!(
            config.max_consecutive_errors > 0,
            "max_consecutive_errors must be positive"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(Status {
            phase: Phase::Idle,
            ticks: 0,
            row_count: 0,
            last_error: None,
        });

        Ok((
            Self {
                config,
                fetcher,
                visualizer,
                stop_rx,
                status_tx,
            },
            RefreshHandle {
                stop: stop_tx,
                status: status_rx,
            },
        ))
    }

    fn publish(&self, phase: Phase, ticks: u64, row_count: usize, last_error: Option<String>) {
        let _ = self.status_tx.send(Status {
            phase,
            ticks,
            row_count,
            last_error,
        });
    }

    /// Run to a terminal state. Tick 0 fetches immediately so the dashboard
    /// shows data without waiting out the first interval.
    pub async fn run(mut self) -> RunSummary {
        let start = Instant::now();
        let deadline = start + self.config.duration;
        let mut ticker = time::interval_at(start, self.config.interval);
        // A slow fetch skips to the next scheduled boundary; latency must
        // not shift the schedule or queue extra fetches.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut state = FetchState { last_row_count: 0 };
        let mut ticks: u64 = 0;
        let mut renders: u64 = 0;
        let mut anomalies: u64 = 0;
        let mut consecutive_errors: u32 = 0;
        let mut last_error: Option<String> = None;
        let mut idle_since = start;

        self.publish(Phase::Running, ticks, state.last_row_count, None);

        let outcome = loop {
            ticker.tick().await;

            // Stop requests are only honored here, at a boundary; an
            // in-flight fetch always completes or fails on its own first.
            if *self.stop_rx.borrow() {
                info!("stop requested; leaving refresh loop");
                break Outcome::Stopped;
            }
            if Instant::now() >= deadline {
                break Outcome::Completed;
            }

            ticks += 1;
            match self.fetcher.fetch().await {
                Ok(table) => {
                    consecutive_errors = 0;
                    last_error = None;
                    let count = table.len();
                    if count < state.last_row_count {
                        // The source is append-only, so a shrink means
                        // someone deleted rows out from under us. Correct
                        // the baseline and report it once.
                        warn!(
                            previous = state.last_row_count,
                            current = count,
                            "row count decreased; external deletion suspected"
                        );
                        anomalies += 1;
                        state.last_row_count = count;
                    } else if count > state.last_row_count {
                        let new_rows = count - state.last_row_count;
                        info!(total = count, new = new_rows, "new responses");
                        state.last_row_count = count;
                        idle_since = Instant::now();
                        match self.visualizer.render(&table) {
                            Ok(summary) => {
                                renders += 1;
                                debug!(
                                    charts = summary.charts,
                                    skipped = summary.skipped,
                                    row_issues = summary.row_issues,
                                    "dashboard rendered"
                                );
                            }
                            Err(e) => {
                                error!(error = %e, "render failed; dashboard left stale");
                            }
                        }
                    } else {
                        debug!(total = count, "no new responses");
                    }
                }
                Err(err) => {
                    if err.is_fatal() {
                        error!(error = %err, "fatal fetch error");
                        break Outcome::Failed(err);
                    }
                    consecutive_errors += 1;
                    warn!(
                        error = %err,
                        consecutive = consecutive_errors,
                        budget = self.config.max_consecutive_errors,
                        "fetch failed"
                    );
                    if consecutive_errors >= self.config.max_consecutive_errors {
                        break Outcome::Failed(err);
                    }
                    last_error = Some(err.to_string());
                }
            }

            self.publish(
                Phase::Running,
                ticks,
                state.last_row_count,
                last_error.clone(),
            );

            if Instant::now() >= deadline {
                break Outcome::Completed;
            }
            if let Some(idle_cutoff) = self.config.idle_stop_after {
                if Instant::now().duration_since(idle_since) >= idle_cutoff {
                    info!(idle = ?idle_cutoff, "no new responses within idle cutoff; stopping");
                    break Outcome::Stopped;
                }
            }
        };

        let phase = outcome.phase();
        let final_error = match &outcome {
            Outcome::Failed(e) => Some(e.to_string()),
            _ => last_error,
        };
        info!(?phase, ticks, renders, anomalies, "refresh loop finished");
        self.publish(phase, ticks, state.last_row_count, final_error);

        RunSummary {
            outcome,
            ticks,
            renders,
            anomalies,
            row_count: state.last_row_count,
        }
    }
}
