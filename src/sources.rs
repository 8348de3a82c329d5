//! Source extractors (C5): pluggable per-site scrapers.
//!
//! Grounded in `grobber/sources/__init__.py`'s `SOURCES` registry (search
//! fan-out iterates every registered source) and the teacher's
//! `sources::traits::SourceHandler` / `sources::factory::SourceHandlerFactory`
//! Open/Closed factory idiom — generalized here to an explicit `register()`
//! call at startup instead of either a Python import-time side effect or
//! the teacher's fixed `match` over a closed `StreamSourceType` enum, since
//! this crate's source set is open-ended (new sites register without
//! touching this module).
//!
//! Concrete site parsers (HTML selectors, per-site quirks) are out of
//! scope (§1 Non-goals: "third-party site parsing specifics"); this module
//! only owns the trait and the registry other code dispatches through.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::ExtractError;
use crate::languages::Language;
use crate::models::{Episode, Medium, SearchResult};

/// One site's scraping logic, grounded in `grobber/sources/gogoanime.py`'s
/// `search`/`raw_eps`/episode `streams` chain: search returns scored
/// candidates, `get_episodes` lists the medium's episodes, `get_episode`
/// fetches one lazily, `raw_streams` returns the unresolved host URLs a
/// stream extractor (C6) will later classify.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    /// Stable identifier, e.g. `"gogoanime"`. Used as `Medium::source` and
    /// as the registry key.
    fn id(&self) -> &str;

    /// May yield nothing if `language` is unsupported by this source
    /// (§4.5) — callers still filter the returned batch on `language`
    /// themselves, since an extractor is not required to honor it.
    async fn search(&self, query: &str, language: Language, dub: bool) -> Result<Vec<SearchResult>, ExtractError>;

    async fn get_episodes(&self, medium: &Medium) -> Result<Vec<Episode>, ExtractError>;

    async fn get_episode(&self, medium: &Medium, index: u32) -> Result<Episode, ExtractError>;

    /// Unresolved candidate host URLs scraped from the episode page; the
    /// resolution engine (C7) turns these into `Stream`s via the C6
    /// registry.
    async fn raw_streams(&self, episode: &Episode) -> Result<Vec<String>, ExtractError>;
}

/// Process-wide registry of source extractors, consulted by the search
/// pipeline (C8) for fan-out and by the query layer (C11) to resolve a
/// `Medium`'s `source` back to its owning extractor.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<dyn SourceExtractor>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, source: Arc<dyn SourceExtractor>) {
        self.sources.write().await.insert(source.id().to_string(), source);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn SourceExtractor>> {
        self.sources.read().await.get(id).cloned()
    }

    /// All registered sources, in arbitrary order — the search pipeline
    /// (C8) fans a query out to each of these.
    pub async fn all(&self) -> Vec<Arc<dyn SourceExtractor>> {
        self.sources.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sources.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::Language;
    use crate::models::search_result::AnimeResult;
    use crate::uid::MediumType;

    struct Stub {
        id: &'static str,
    }

    #[async_trait]
    impl SourceExtractor for Stub {
        fn id(&self) -> &str {
            self.id
        }

        async fn search(&self, query: &str, language: Language, _dub: bool) -> Result<Vec<SearchResult>, ExtractError> {
            let medium = Medium::new(MediumType::Anime, self.id, query, language, "/x");
            Ok(vec![SearchResult {
                anime: AnimeResult::Single(medium),
                certainty: 1.0,
            }])
        }

        async fn get_episodes(&self, _medium: &Medium) -> Result<Vec<Episode>, ExtractError> {
            Ok(vec![Episode::new(0, vec![])])
        }

        async fn get_episode(&self, _medium: &Medium, index: u32) -> Result<Episode, ExtractError> {
            Ok(Episode::new(index, vec![]))
        }

        async fn raw_streams(&self, _episode: &Episode) -> Result<Vec<String>, ExtractError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let registry = SourceRegistry::new();
        registry.register(Arc::new(Stub { id: "gogoanime" })).await;
        assert!(registry.get("gogoanime").await.is_some());
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn all_returns_every_registered_source() {
        let registry = SourceRegistry::new();
        registry.register(Arc::new(Stub { id: "a" })).await;
        registry.register(Arc::new(Stub { id: "b" })).await;
        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.all().await.len(), 2);
    }
}
