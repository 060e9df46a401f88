//! The scan loop.
//!
//! [`ScanOrchestrator`] runs one scan at startup and then, if an interval is
//! configured, one per tick until cancelled. Each cycle loads a batch from the
//! [`CertificateSource`] on a blocking thread and hands it to the
//! [`MetricsPublisher`]. Cycles never overlap and a failing cycle never ends
//! the loop.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics::MetricsPublisher;
use crate::source::CertificateSource;

/// Counts reported by a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub certs: usize,
    pub errors: usize,
}

pub struct ScanOrchestrator {
    source: Arc<dyn CertificateSource>,
    publisher: Arc<dyn MetricsPublisher>,
    interval: Duration,
    cancel: CancellationToken,
}

impl ScanOrchestrator {
    /// # Arguments
    /// * `interval` - Period between scans; zero means scan once at startup only
    /// * `cancel` - Stops the loop between cycles and is passed to the source
    pub fn new(
        source: Arc<dyn CertificateSource>,
        publisher: Arc<dyn MetricsPublisher>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        ScanOrchestrator {
            source,
            publisher,
            interval,
            cancel,
        }
    }

    /// Runs the startup cycle, then the periodic loop if an interval is set.
    /// Returns once the loop has stopped.
    pub async fn run(&self) {
        self.run_cycle().await;

        if self.interval.is_zero() {
            debug!("no scan interval configured, not rescheduling");
            return;
        }

        info!(interval = ?self.interval, "starting periodic scan");
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("stopping periodic scan");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Runs one load-and-publish cycle.
    ///
    /// Returns `None` when the cycle failed; the failure is logged and the
    /// previous snapshot stays in place.
    pub async fn run_cycle(&self) -> Option<CycleSummary> {
        let started = Instant::now();
        info!(location = %self.source.location().display(), "starting certificate scan");

        let source = Arc::clone(&self.source);
        let publisher = Arc::clone(&self.publisher);
        let cancel = self.cancel.clone();

        let cycle = tokio::task::spawn_blocking(move || {
            let batch = source.load(&cancel);
            for err in &batch.errors {
                debug!(
                    path = %err.path().display(),
                    error_type = %err.kind(),
                    cause = err.cause(),
                    "certificate load error"
                );
            }
            let summary = CycleSummary {
                certs: batch.records.len(),
                errors: batch.errors.len(),
            };
            publisher.publish(batch);
            summary
        });

        match cycle.await {
            Ok(summary) => {
                info!(
                    certs = summary.certs,
                    errors = summary.errors,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "scan done"
                );
                Some(summary)
            }
            Err(e) if e.is_panic() => {
                error!(
                    panic = %panic_message(e.into_panic()),
                    "scan cycle panicked, keeping previous snapshot"
                );
                None
            }
            Err(e) => {
                error!(error = %e, "scan cycle aborted, keeping previous snapshot");
                None
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
