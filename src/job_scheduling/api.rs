//! External API for the job scheduling system — a thin facade other
//! parts of the application (the web stub, the CLI) call into instead
//! of touching `JobScheduler` directly.

use super::job_scheduler::JobScheduler;
use super::types::JobPriority;
use crate::index_scraper::IndexScraperCategory;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct JobSchedulingApi {
    job_scheduler: Arc<JobScheduler>,
}

impl JobSchedulingApi {
    pub fn new(job_scheduler: Arc<JobScheduler>) -> Self {
        Self { job_scheduler }
    }

    /// Trigger an immediate out-of-band scrape for `category`, bypassing
    /// the standing schedule.
    pub async fn trigger_scrape(&self, category: IndexScraperCategory) -> Result<()> {
        info!(category = %category, "API: triggering immediate index scrape");
        self.job_scheduler.trigger_scrape(category).await
    }

    /// Schedule a maintenance operation
    pub async fn schedule_maintenance(&self, operation: String, priority: JobPriority) -> Result<()> {
        info!("API: scheduling maintenance operation: {}", operation);
        self.job_scheduler.schedule_maintenance(operation, priority).await
    }

    /// Get current queue statistics
    pub async fn get_queue_stats(&self) -> crate::job_scheduling::job_queue::JobQueueStats {
        self.job_scheduler.get_queue_stats().await
    }

    /// Health check endpoint for the scheduling system
    pub async fn health_check(&self) -> SchedulingHealthStatus {
        let stats = self.get_queue_stats().await;

        SchedulingHealthStatus {
            is_healthy: true,
            pending_jobs: stats.pending_jobs,
            running_jobs: stats.running_jobs,
            total_tracked_keys: stats.total_tracked_keys,
        }
    }
}

/// Health status of the scheduling system
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulingHealthStatus {
    pub is_healthy: bool,
    pub pending_jobs: usize,
    pub running_jobs: usize,
    pub total_tracked_keys: usize,
}
