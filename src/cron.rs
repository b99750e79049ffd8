use crate::errors::AppError;
use crate::storage::OtpStore;
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::{error, info, instrument};

/// Periodic sweep of expired OTP records, independent of whether anyone
/// tries to verify them.
pub struct CleanupService {
    store: Arc<dyn OtpStore>,
}

impl CleanupService {
    pub fn new(store: Arc<dyn OtpStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn run_cleanup(&self) -> Result<usize, AppError> {
        let removed = self.store.purge_expired().await?;
        info!(removed, "expired OTP sweep completed");
        Ok(removed)
    }

    /// Runs the sweep every `interval`, forever. Each run is spawned so a slow
    /// store does not make the timer drift.
    pub async fn start_scheduler(self: Arc<Self>, interval: Duration) {
        let mut timer = time::interval(interval);
        // The first tick completes immediately; skip it so the first sweep
        // happens one interval after startup.
        timer.tick().await;

        info!("Cleanup scheduler started with interval: {:?}", interval);

        loop {
            timer.tick().await;

            let service = self.clone();
            tokio::spawn(async move {
                if let Err(e) = service.run_cleanup().await {
                    error!("Cleanup job failed: {:?}", e);
                }
            });
        }
    }
}
