//! Backend Health Monitor
//!
//! Background task checking the record store at a fixed interval. The latest
//! status is readable at any time; availability changes are logged once per
//! transition. Dropping the monitor stops the task.

use cert_core::logging::operations;
use cert_core::{HealthStatus, RecordStore};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Periodic health check of one record store
pub struct HealthMonitor {
    latest: watch::Receiver<Option<HealthStatus>>,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Spawn the monitor; the first check runs immediately
    pub fn start(store: Arc<dyn RecordStore>, every: Duration) -> Self {
        let (tx, rx) = watch::channel(None);
        let backend = store.backend();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut was_available: Option<bool> = None;

            loop {
                ticker.tick().await;

                let status = match store.health().await {
                    Ok(status) => status,
                    Err(e) => HealthStatus::unavailable(backend, e.to_string()),
                };

                match (was_available, status.available) {
                    (Some(false), true) => info!(
                        backend = %backend,
                        operation = operations::HEALTH_CHECK,
                        "Backend recovered"
                    ),
                    (Some(true) | None, false) => warn!(
                        backend = %backend,
                        operation = operations::HEALTH_CHECK,
                        error = %status.message,
                        "Backend unavailable"
                    ),
                    _ => debug!(
                        backend = %backend,
                        operation = operations::HEALTH_CHECK,
                        available = status.available,
                        "Health check"
                    ),
                }
                was_available = Some(status.available);

                if tx.send(Some(status)).is_err() {
                    break;
                }
            }
        });

        info!(
            backend = %backend,
            interval_secs = every.as_secs(),
            "Started health monitor"
        );

        Self { latest: rx, handle }
    }

    /// Most recent status, `None` before the first check completes
    pub fn latest(&self) -> Option<HealthStatus> {
        self.latest.borrow().clone()
    }

    /// Wait for the next completed check
    pub async fn changed(&mut self) -> Option<HealthStatus> {
        self.latest.changed().await.ok()?;
        self.latest()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the monitor; the last status stays readable
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
