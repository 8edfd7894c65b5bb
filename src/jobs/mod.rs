use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::orphan_rendition_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Remove rendition groups with no catalog row (runs every 6 hours)
    async fn orphan_rendition_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(21600));

        loop {
            interval.tick().await;
            info!("Running orphan rendition sweep");

            match tasks::sweep_orphaned_renditions(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Removed {} orphaned rendition groups", count);
                    } else {
                        info!("Orphan sweep: nothing to remove");
                    }
                }
                Err(e) => error!("Failed to sweep orphaned renditions: {}", e),
            }
        }
    }

    /// Health check and rate-limit pruning (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }

            let tracked = tasks::prune_rate_limits(&scheduler.context);
            debug!("Rate limiter tracking {} clients", tracked);
        }
    }
}
