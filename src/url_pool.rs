//! `UrlPool` (C2): failover among mirror domains with TTL'd persistence.
//!
//! Grounded in `original_source/grobber/url_pool.py`: a named pool of
//! candidate base URLs. `resolve()` loads the cached choice from the
//! store if present and unexpired; otherwise it HEAD-races every
//! candidate concurrently (first to *respond* wins, not first in list
//! order, per §4.2 step 2), moves the winner to the front of the list,
//! and persists `(url, expires_at)` with a TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::GrobberError;
use crate::request::Request;
use crate::store::DocumentStore;

const DEFAULT_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlPoolState {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// One named mirror pool. The candidate list is mutated in place so a
/// winning mirror stays first on subsequent calls within the process.
pub struct UrlPool {
    name: String,
    urls: Mutex<Vec<String>>,
    strip_slash: bool,
    ttl: Duration,
    store: Arc<dyn DocumentStore>,
    cached: Mutex<Option<UrlPoolState>>,
}

impl UrlPool {
    pub fn new(name: impl Into<String>, urls: Vec<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name: name.into(),
            urls: Mutex::new(urls),
            strip_slash: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS as u64),
            store,
            cached: Mutex::new(None),
        }
    }

    pub fn with_strip_slash(mut self, strip: bool) -> Self {
        self.strip_slash = strip;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn collection_key(&self) -> String {
        format!("url_pool:{}", self.name)
    }

    fn prepare(&self, url: &str) -> String {
        if self.strip_slash {
            url.trim_end_matches('/').to_string()
        } else {
            url.to_string()
        }
    }

    /// Resolve the pool's current base URL, probing mirrors if the
    /// cached choice is empty or expired.
    pub async fn resolve(&self) -> Result<String, GrobberError> {
        let mut cache_guard = self.cached.lock().await;

        if cache_guard.is_none() {
            if let Some(state) = self
                .store
                .get::<UrlPoolState>(&self.collection_key())
                .await
            {
                *cache_guard = Some(state);
            }
        }

        let expired = match &*cache_guard {
            Some(state) => Utc::now() > state.expires_at,
            None => true,
        };

        if !expired {
            return Ok(self.prepare(&cache_guard.as_ref().unwrap().url));
        }

        debug!(pool = %self.name, "searching new url");
        let winner = self.probe_candidates().await?;

        let expires_at = Utc::now() + chrono::Duration::from_std(self.ttl).unwrap();
        let state = UrlPoolState {
            url: winner,
            expires_at,
        };
        self.store.upsert(&self.collection_key(), &state).await;
        let url = self.prepare(&state.url);
        *cache_guard = Some(state);
        Ok(url)
    }

    /// Race a HEAD probe against every candidate concurrently; the first
    /// to respond successfully wins, regardless of list position. Losers
    /// still in flight are dropped along with the `FuturesUnordered`.
    async fn probe_candidates(&self) -> Result<String, GrobberError> {
        let mut urls = self.urls.lock().await;

        let mut probes: FuturesUnordered<_> = urls
            .iter()
            .cloned()
            .map(|candidate| async move {
                let req = Request::new(candidate.clone());
                (candidate, req.head_success().await)
            })
            .collect();

        while let Some((candidate, success)) = probes.next().await {
            if success {
                let i = urls.iter().position(|u| *u == candidate).expect("candidate came from urls");
                let winner = urls.remove(i);
                urls.insert(0, winner.clone());
                return Ok(winner);
            }
        }

        Err(GrobberError::NoWorkingUrl {
            pool: self.name.clone(),
        })
    }
}

/// Process-wide registry of named pools, consulted by `Request`'s
/// `{POOL}` URL templating.
#[derive(Default)]
pub struct UrlPoolRegistry {
    pools: std::collections::HashMap<String, Arc<UrlPool>>,
}

impl UrlPoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pool: Arc<UrlPool>, placeholder: impl Into<String>) {
        self.pools.insert(placeholder.into(), pool);
    }

    pub fn get(&self, placeholder: &str) -> Option<Arc<UrlPool>> {
        self.pools.get(placeholder).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn prepares_urls_by_stripping_trailing_slash() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let pool = UrlPool::new("test", vec!["https://example.com/".into()], store);
        assert_eq!(pool.prepare("https://example.com/"), "https://example.com");
    }

    #[test]
    fn registry_round_trips_by_placeholder() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let pool = Arc::new(UrlPool::new("gogoanime", vec![], store));
        let mut registry = UrlPoolRegistry::new();
        registry.register(pool.clone(), "GOGOANIME_URL");
        assert!(registry.get("GOGOANIME_URL").is_some());
        assert!(registry.get("MISSING").is_none());
    }
}
