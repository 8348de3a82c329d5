//! Query layer (C11): maps user-visible query parameters onto the
//! resolver chain. Grounded in `original_source/grobber/query.py`'s
//! ordered constructors and the teacher's `web::api` parameter-struct
//! convention: an enum of parameterized constructors, tried in order,
//! that the (stubbed) HTTP boundary in `web` builds from request
//! parameters and then resolves.

use serde::Serialize;

use crate::errors::{GrobberError, LookupError};
use crate::languages::Language;
use crate::models::search_result::AnimeResult;
use crate::models::{Medium, MediumGroup};
use crate::pipeline::{get_anime_group, search};
use crate::sources::SourceRegistry;
use crate::store::{DocumentStore, DocumentStoreExt};
use crate::uid::Uid;

/// Either half of the Medium/MediumGroup split a resolved query can land
/// on — a single-source record, or a cross-source cluster (§3).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnimeRecord {
    Medium(Medium),
    Group(MediumGroup),
}

impl AnimeRecord {
    pub fn title(&self) -> &str {
        match self {
            AnimeRecord::Medium(m) => &m.title,
            AnimeRecord::Group(g) => &g.title,
        }
    }
}

/// A parameterized constructor tried in the order given by §4.11: a
/// direct uid lookup first, a title search as the fallback.
#[derive(Debug, Clone)]
pub enum QueryRequest {
    Uid(Uid),
    Title {
        anime: String,
        language: Language,
        dubbed: bool,
        group: bool,
    },
}

impl QueryRequest {
    /// Try every constructor in order, resolving the first that applies.
    /// Both variants are self-contained requests rather than a literal
    /// fallback chain, so "in order" here means "dispatch on which
    /// variant the caller built" — the ordering is enforced at
    /// construction time by whichever boundary builds the `QueryRequest`
    /// (see `web`), matching the original's `try_from_uid` /
    /// `try_from_title` pair.
    pub async fn resolve(&self, sources: &SourceRegistry, store: &dyn DocumentStore) -> Result<AnimeRecord, GrobberError> {
        match self {
            QueryRequest::Uid(uid) => resolve_uid(uid, store).await,
            QueryRequest::Title {
                anime,
                language,
                dubbed,
                group,
            } => resolve_title(anime, *language, *dubbed, *group, sources, store).await,
        }
    }
}

/// UID path (§4.11 step 1). `source = None` resolves to the
/// `MediumGroup` clustered over every stored `Medium` sharing the uid's
/// identity; `source = Some(_)` is a direct `Medium` lookup by uid,
/// falling back to a scan over the same identity's stored media for one
/// whose `source` matches (the "source index fallback").
async fn resolve_uid(uid: &Uid, store: &dyn DocumentStore) -> Result<AnimeRecord, GrobberError> {
    match &uid.source {
        None => get_anime_group(store, uid.medium_type, &uid.medium_id, uid.language, uid.dubbed)
            .await
            .map(AnimeRecord::Group)
            .ok_or_else(|| LookupError::UidUnknown(uid.to_string()).into()),
        Some(source) => {
            if let Some(medium) = store.get::<Medium>(&format!("medium:{uid}")).await {
                return Ok(AnimeRecord::Medium(medium));
            }

            store
                .find_prefix::<Medium>("medium:")
                .await
                .into_iter()
                .find(|m| {
                    m.medium_type == uid.medium_type
                        && m.medium_id == uid.medium_id
                        && m.language == uid.language
                        && m.dubbed == uid.dubbed
                        && &m.source == source
                })
                .map(AnimeRecord::Medium)
                .ok_or_else(|| LookupError::UidUnknown(uid.to_string()).into())
        }
    }
}

/// Title path (§4.11 step 2): delegate to the search pipeline and take
/// its top-ranked result, grouped or ungrouped per `group`.
async fn resolve_title(
    anime: &str,
    language: Language,
    dubbed: bool,
    group: bool,
    sources: &SourceRegistry,
    store: &dyn DocumentStore,
) -> Result<AnimeRecord, GrobberError> {
    let mut results = search(anime, language, dubbed, 1, group, sources, store).await?;
    let best = results.drain(..).next().map(|r| r.anime);

    match best {
        Some(AnimeResult::Single(m)) => Ok(AnimeRecord::Medium(m)),
        Some(AnimeResult::Group(g)) => Ok(AnimeRecord::Group(g)),
        None => Err(LookupError::AnimeNotFound(anime.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid::MediumType;

    fn medium(title: &str, source: &str) -> Medium {
        Medium::new(MediumType::Anime, source, title, Language::En, "/x")
    }

    #[tokio::test]
    async fn uid_without_source_resolves_to_a_group() {
        let store = crate::store::MemoryStore::shared();
        let a = medium("Naruto", "gogoanime");
        let b = medium("Naruto", "nineanime");
        store.upsert(&format!("medium:{}", a.uid), &a).await;
        store.upsert(&format!("medium:{}", b.uid), &b).await;

        let uid = Uid::create(MediumType::Anime, "naruto", None, Language::En, false);
        let request = QueryRequest::Uid(uid);
        let sources = SourceRegistry::new();

        let record = request.resolve(&sources, store.as_ref()).await.unwrap();
        match record {
            AnimeRecord::Group(g) => assert_eq!(g.source_count(), 2),
            AnimeRecord::Medium(_) => panic!("expected a group"),
        }
    }

    #[tokio::test]
    async fn uid_with_source_falls_back_to_source_index_scan() {
        let store = crate::store::MemoryStore::shared();
        let m = medium("Naruto", "gogoanime");
        // Stored under its own uid key, not the one we'll query with.
        store.upsert(&format!("medium:{}", m.uid), &m).await;

        let uid = Uid::create(MediumType::Anime, "naruto", Some("gogoanime".to_string()), Language::En, false);
        assert_eq!(uid, m.uid);

        let request = QueryRequest::Uid(uid);
        let sources = SourceRegistry::new();
        let record = request.resolve(&sources, store.as_ref()).await.unwrap();
        match record {
            AnimeRecord::Medium(found) => assert_eq!(found.source, "gogoanime"),
            AnimeRecord::Group(_) => panic!("expected a single medium"),
        }
    }

    #[tokio::test]
    async fn unknown_uid_is_a_lookup_miss() {
        let store = crate::store::MemoryStore::shared();
        let uid = Uid::create(MediumType::Anime, "missing", None, Language::En, false);
        let request = QueryRequest::Uid(uid);
        let sources = SourceRegistry::new();

        let err = request.resolve(&sources, store.as_ref()).await.unwrap_err();
        assert!(matches!(err, GrobberError::Lookup(LookupError::UidUnknown(_))));
    }

    #[tokio::test]
    async fn title_query_with_no_sources_and_empty_store_is_anime_not_found() {
        let store = crate::store::MemoryStore::shared();
        let sources = SourceRegistry::new();
        let request = QueryRequest::Title {
            anime: "Naruto".to_string(),
            language: Language::En,
            dubbed: false,
            group: false,
        };

        let err = request.resolve(&sources, store.as_ref()).await.unwrap_err();
        assert!(matches!(err, GrobberError::Lookup(LookupError::AnimeNotFound(_))));
    }
}
