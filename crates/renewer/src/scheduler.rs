//! Periodic renewal scheduler
//!
//! Runs a renewal pass on start and then once per check interval until told
//! to stop.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::renewer::Renewer;

/// Default check interval (12 hours)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Minimum check interval (1 hour)
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// Background renewal scheduler
///
/// A pass that has started always runs to completion; shutdown is only
/// observed between passes.
#[derive(Debug)]
pub struct RenewalScheduler {
    renewer: Renewer,
    check_interval: Duration,
}

impl RenewalScheduler {
    /// Create a scheduler with the default interval
    pub fn new(renewer: Renewer) -> Self {
        Self {
            renewer,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Set the check interval
    ///
    /// The interval is clamped to a minimum of 1 hour to avoid
    /// excessive polling.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval.max(MIN_CHECK_INTERVAL);
        self
    }

    /// Effective check interval
    pub fn interval(&self) -> Duration {
        self.check_interval
    }

    /// Run passes until `shutdown` resolves, returning how many ran
    pub async fn run<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        info!(
            check_interval_hours = self.check_interval.as_secs() / 3600,
            "Starting certificate renewal scheduler"
        );

        tokio::pin!(shutdown);
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut runs = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(runs, "Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    debug!("Running scheduled renewal check");
                    let start = Instant::now();
                    let report = self.renewer.run_once().await;
                    runs += 1;

                    if report.has_failures() {
                        warn!(
                            renewed = report.renewed(),
                            failed = report.failed(),
                            "Scheduled renewal run had failures"
                        );
                    }
                    debug!(
                        duration_ms = start.elapsed().as_millis() as u64,
                        next_check_hours = self.check_interval.as_secs() / 3600,
                        "Renewal check complete"
                    );
                }
            }
        }

        runs
    }
}
