//! Periodic generation trigger
//!
//! Ticks run one after another on a single task: a slow cycle delays the next
//! tick instead of overlapping it, and missed ticks are skipped. Failures are
//! logged and swallowed so one bad render never stops the schedule.

use crate::lifecycle::GenerationArbiter;
use crate::models::{GenerationOutcome, Trigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Running scheduler task
pub struct GenerationScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    period: Duration,
}

impl GenerationScheduler {
    /// Spawn the scheduler; the first tick fires one `period` from now
    pub fn start(arbiter: Arc<GenerationArbiter>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(period_secs = period.as_secs_f64(), "Scheduler started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let caption = format!("Auto {} UTC", arbiter.clock().now().format("%H:%M"));
                        match arbiter.run_cycle(Trigger::Scheduled, Some(&caption)).await {
                            GenerationOutcome::Created(record) => {
                                debug!(url_path = %record.url_path, "Scheduled frame stored");
                            }
                            GenerationOutcome::Duplicate => {
                                debug!("Scheduled frame already stored");
                            }
                            GenerationOutcome::Failed(e) => {
                                error!(error = %e, "Scheduled generation failed");
                            }
                        }
                    }
                }
            }

            info!("Scheduler stopped");
        });

        Self {
            cancel,
            handle,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the schedule and wait for an in-flight cycle to finish
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.handle).await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    }
}

impl Drop for GenerationScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
