//! Job scheduler service: evaluates the standing index-scrape schedule
//! and enqueues jobs as they come due. Grounded in
//! `original_source/grobber/index_scraper/schedule.py`'s three
//! triggers (`CronTrigger(day="*")` for NEW, `IntervalTrigger(weeks=2)`
//! for ONGOING, `IntervalTrigger(weeks=16)` for FULL) — the teacher's
//! per-source DB-driven cron evaluation is replaced with a fixed,
//! config-driven schedule since this crate has no source-table to poll.

use super::job_queue::JobQueue;
use super::types::{JobPriority, JobType, ScheduledJob};
use crate::config::JobSchedulingConfig;
use crate::index_scraper::IndexScraperCategory;
use crate::store::{DocumentStore, DocumentStoreExt};
use anyhow::Result;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};

/// Persisted "last run" marker for a category, keyed by
/// `job_schedule:{category}` in the document store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct LastRun {
    at: DateTime<Utc>,
}

/// Service responsible for evaluating the standing schedule and
/// enqueuing due jobs.
pub struct JobScheduler {
    job_queue: Arc<JobQueue>,
    store: Arc<dyn DocumentStore>,
    config: JobSchedulingConfig,
}

impl JobScheduler {
    pub fn new(job_queue: Arc<JobQueue>, store: Arc<dyn DocumentStore>, config: JobSchedulingConfig) -> Self {
        Self {
            job_queue,
            store,
            config,
        }
    }

    /// Run the job scheduler service
    pub async fn run(&self, cancellation_token: tokio_util::sync::CancellationToken) -> Result<()> {
        info!("Starting job scheduler service");
        let mut schedule_check = interval(TokioDuration::from_std(self.config.scheduler_tick).unwrap_or(TokioDuration::from_secs(60)));

        loop {
            tokio::select! {
                _ = schedule_check.tick() => {
                    if let Err(e) = self.schedule_due_jobs().await {
                        error!("Error scheduling due jobs: {}", e);
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("Job scheduler received cancellation signal, shutting down");
                    break;
                }
            }
        }

        info!("Job scheduler service stopped");
        Ok(())
    }

    /// Check every standing category and enqueue it if due.
    async fn schedule_due_jobs(&self) -> Result<()> {
        let now = Utc::now();
        debug!(now = %now.format("%Y-%m-%d %H:%M:%S UTC"), "checking for jobs due");

        if self.is_new_due(now)? {
            self.enqueue_category(IndexScraperCategory::New, JobPriority::Normal).await;
        }

        if self.is_interval_due(IndexScraperCategory::Ongoing, self.config.ongoing_scrape_interval, now).await {
            self.enqueue_category(IndexScraperCategory::Ongoing, JobPriority::Normal).await;
        }

        if self.is_interval_due(IndexScraperCategory::Full, self.config.full_scrape_interval, now).await {
            self.enqueue_category(IndexScraperCategory::Full, JobPriority::Low).await;
        }

        Ok(())
    }

    /// NEW runs once per day per its cron expression; we check whether
    /// "now" has crossed a scheduled tick since the last run.
    fn is_new_due(&self, now: DateTime<Utc>) -> Result<bool> {
        let schedule = Schedule::from_str(&self.config.new_scrape_cron)
            .map_err(|e| anyhow::anyhow!("invalid cron expression '{}': {}", self.config.new_scrape_cron, e))?;
        // A cheap approximation: due if a scheduled tick falls within the
        // last scheduler-tick window.
        let window_start = now - chrono::Duration::from_std(self.config.scheduler_tick).unwrap_or_default();
        Ok(schedule.after(&window_start).next().map(|t| t <= now).unwrap_or(false))
    }

    async fn last_run(&self, category: IndexScraperCategory) -> Option<DateTime<Utc>> {
        let key = format!("job_schedule:{category}");
        self.store.get::<LastRun>(&key).await.map(|r| r.at)
    }

    async fn mark_run(&self, category: IndexScraperCategory, at: DateTime<Utc>) {
        let key = format!("job_schedule:{category}");
        self.store.upsert(&key, &LastRun { at }).await;
    }

    async fn is_interval_due(&self, category: IndexScraperCategory, interval: std::time::Duration, now: DateTime<Utc>) -> bool {
        let Ok(interval) = chrono::Duration::from_std(interval) else {
            return false;
        };
        match self.last_run(category).await {
            Some(last) => now - last >= interval,
            None => true,
        }
    }

    async fn enqueue_category(&self, category: IndexScraperCategory, priority: JobPriority) {
        let job = ScheduledJob::new(JobType::IndexScrape(category), priority);
        let now = Utc::now();

        match self.job_queue.enqueue(job).await {
            Ok(true) => {
                info!(category = %category, "scheduled standing index scrape");
                self.mark_run(category, now).await;
            }
            Ok(false) => debug!(category = %category, "index scrape already queued, skipping"),
            Err(e) => warn!(category = %category, error = %e, "failed to enqueue index scrape"),
        }
    }

    /// Trigger an immediate out-of-band scrape for `category` (a manual
    /// override of the standing schedule), used by the API layer.
    pub async fn trigger_scrape(&self, category: IndexScraperCategory) -> Result<()> {
        let job = ScheduledJob::new(JobType::IndexScrape(category), JobPriority::High);
        match self.job_queue.enqueue(job).await {
            Ok(true) => {
                info!(category = %category, "triggered immediate index scrape");
                Ok(())
            }
            Ok(false) => {
                info!(category = %category, "index scrape already scheduled");
                Ok(())
            }
            Err(e) => {
                error!(category = %category, error = %e, "failed to trigger index scrape");
                Err(e.into())
            }
        }
    }

    /// Schedule a maintenance job
    pub async fn schedule_maintenance(&self, operation: String, priority: JobPriority) -> Result<()> {
        let job = ScheduledJob::new(JobType::Maintenance(operation.clone()), priority);

        match self.job_queue.enqueue(job).await {
            Ok(true) => {
                info!("Scheduled maintenance job: {}", operation);
                Ok(())
            }
            Ok(false) => {
                debug!("Maintenance job '{}' already scheduled", operation);
                Ok(())
            }
            Err(e) => {
                error!("Failed to schedule maintenance job '{}': {}", operation, e);
                Err(e.into())
            }
        }
    }

    /// Get queue statistics
    pub async fn get_queue_stats(&self) -> crate::job_scheduling::job_queue::JobQueueStats {
        self.job_queue.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn config() -> JobSchedulingConfig {
        JobSchedulingConfig::default()
    }

    #[tokio::test]
    async fn interval_due_when_never_run() {
        let store: Arc<dyn DocumentStore> = MemoryStore::shared();
        let scheduler = JobScheduler::new(Arc::new(JobQueue::new()), store, config());
        assert!(scheduler.is_interval_due(IndexScraperCategory::Ongoing, std::time::Duration::from_secs(60), Utc::now()).await);
    }

    #[tokio::test]
    async fn interval_not_due_immediately_after_a_run() {
        let store: Arc<dyn DocumentStore> = MemoryStore::shared();
        let scheduler = JobScheduler::new(Arc::new(JobQueue::new()), store, config());
        let now = Utc::now();
        scheduler.mark_run(IndexScraperCategory::Full, now).await;
        assert!(!scheduler.is_interval_due(IndexScraperCategory::Full, std::time::Duration::from_secs(3600), now).await);
    }

    #[tokio::test]
    async fn interval_due_once_elapsed() {
        let store: Arc<dyn DocumentStore> = MemoryStore::shared();
        let scheduler = JobScheduler::new(Arc::new(JobQueue::new()), store, config());
        let last_run = Utc::now() - Duration::hours(2);
        scheduler.mark_run(IndexScraperCategory::Ongoing, last_run).await;
        assert!(scheduler.is_interval_due(IndexScraperCategory::Ongoing, std::time::Duration::from_secs(3600), Utc::now()).await);
    }

    #[tokio::test]
    async fn trigger_scrape_enqueues_a_high_priority_job() {
        let store: Arc<dyn DocumentStore> = MemoryStore::shared();
        let job_queue = Arc::new(JobQueue::new());
        let scheduler = JobScheduler::new(job_queue.clone(), store, config());

        scheduler.trigger_scrape(IndexScraperCategory::New).await.unwrap();
        let ready = job_queue.get_ready_jobs(Utc::now(), 10).await;
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].priority, JobPriority::High);
    }
}
