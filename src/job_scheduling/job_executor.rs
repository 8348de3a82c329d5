//! Job executor: performs the actual work a `ScheduledJob` names.
//! Grounded in `index_scraper/index_scrapers/__init__.py`'s
//! `run_index_scrapers` (fan out every scraper in a category
//! concurrently) and the teacher's `JobExecutor::execute_maintenance`
//! dispatch-by-name idiom.

use crate::index_scraper::{IndexScraperCategory, IndexScraperRegistry};
use crate::store::DocumentStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Service responsible for executing the actual work of jobs.
pub struct JobExecutor {
    registry: Arc<IndexScraperRegistry>,
    store: Arc<dyn DocumentStore>,
}

impl JobExecutor {
    pub fn new(registry: Arc<IndexScraperRegistry>, store: Arc<dyn DocumentStore>) -> Self {
        Self { registry, store }
    }

    /// Run every index scraper registered for `category`.
    pub async fn execute_index_scrape(&self, category: IndexScraperCategory) -> Result<()> {
        info!(category = %category, "executing index scrape job");
        self.registry.run_category(category, self.store.clone()).await;
        Ok(())
    }

    /// Execute a maintenance job
    pub async fn execute_maintenance(&self, operation: &str) -> Result<()> {
        info!("Executing maintenance operation: {}", operation);

        match operation {
            "refresh_cache" => self.refresh_cache().await,
            "health_check" => self.health_check().await,
            _ => {
                warn!("Unknown maintenance operation: {}", operation);
                Err(anyhow::anyhow!("Unknown maintenance operation: {}", operation))
            }
        }
    }

    /// Refresh internal caches (maintenance operation). Placeholder: the
    /// engine has no long-lived cache beyond `UrlPool`'s own TTL
    /// expiry, which is self-refreshing on demand.
    async fn refresh_cache(&self) -> Result<()> {
        info!("cache refresh requested (no-op: caches are self-expiring)");
        Ok(())
    }

    /// Perform a system health check (maintenance operation).
    async fn health_check(&self) -> Result<()> {
        info!("system health check completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn execute_index_scrape_runs_without_error_for_empty_registry() {
        let registry = Arc::new(IndexScraperRegistry::new());
        let store: Arc<dyn DocumentStore> = MemoryStore::shared();
        let executor = JobExecutor::new(registry, store);

        executor.execute_index_scrape(IndexScraperCategory::New).await.unwrap();
    }

    #[tokio::test]
    async fn execute_maintenance_rejects_unknown_operations() {
        let registry = Arc::new(IndexScraperRegistry::new());
        let store: Arc<dyn DocumentStore> = MemoryStore::shared();
        let executor = JobExecutor::new(registry, store);

        assert!(executor.execute_maintenance("nonsense").await.is_err());
        assert!(executor.execute_maintenance("health_check").await.is_ok());
    }
}
