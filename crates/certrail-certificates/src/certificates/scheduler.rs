//! Periodic renewal sweep

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::service::CertificateService;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Floor for the check interval
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct RenewalScheduler {
    service: Arc<CertificateService>,
    check_interval: Duration,
}

impl RenewalScheduler {
    pub fn new(service: Arc<CertificateService>) -> Self {
        Self {
            service,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval.max(MIN_CHECK_INTERVAL);
        self
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Sweep immediately, then once per interval, until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Starting certificate renewal scheduler (every {}s)",
            self.check_interval.as_secs()
        );

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Renewal scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            debug!("Running scheduled certificate renewal check");
            match self.service.renew_due_with_cancellation(&cancel).await {
                Ok(report) if !report.failed.is_empty() => {
                    for failure in &report.failed {
                        error!("Renewal of {} failed: {}", failure.domain, failure.error);
                    }
                }
                Ok(_) => {}
                Err(e) => error!("Certificate renewal check failed: {}", e),
            }
        }
    }
}
