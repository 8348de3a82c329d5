//! Episode/Stream resolution (C7): dispatches an episode's raw stream
//! URLs through the stream extractor registry, then picks a winner by
//! racing priority groups. Grounded in
//! `original_source/grobber/anime/group.py`'s `smart_wait`/
//! `get_from_all` racing idiom, re-expressed with
//! `futures::stream::FuturesUnordered` the same way `request.rs`'s
//! staggered-retry loop races attempts, rather than asyncio's
//! `as_completed`.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

use crate::models::{Episode, ResolvedEpisode, Stream};
use crate::request::Request;
use crate::streams::{StreamExtractorFactory, StreamExtractorRegistry};

/// Resolve `episode`'s raw stream URLs priority group by priority
/// group, highest first, extracting (and HEAD-probing) only the
/// streams of the group currently in play. A group races its members
/// concurrently; the moment one yields `workingExternalSelf`, the rest
/// of that group is dropped (cancelling whatever extraction was still
/// in flight) and lower-priority groups are never probed at all (§4.7
/// steps 1–4, testable property S4). Unmatched URLs (no factory claims
/// them) are dropped before any I/O; a factory that errors is logged
/// and dropped — extraction failures never propagate past this
/// boundary (§7 propagation policy).
pub async fn resolve_episode(episode: &Episode, registry: &StreamExtractorRegistry, client: &Client) -> ResolvedEpisode {
    let mut by_priority: BTreeMap<i32, Vec<(usize, String, Arc<dyn StreamExtractorFactory>)>> = BTreeMap::new();

    for (index, url) in episode.raw_streams.iter().enumerate() {
        let Some(factory) = registry.dispatch(url) else {
            debug!(url = %url, "no stream extractor claims this url");
            continue;
        };
        by_priority.entry(factory.priority()).or_default().push((index, url.clone(), factory));
    }

    let mut by_index = BTreeMap::new();

    for (_priority, group) in by_priority.into_iter().rev() {
        let mut extractions: FuturesUnordered<_> = group
            .into_iter()
            .map(|(index, url, factory)| {
                let client = client.clone();
                async move {
                    let request = Request::with_client(client, url.clone());
                    (index, factory.extract(&request).await, url)
                }
            })
            .collect();

        let mut group_won = false;
        while let Some((index, result, url)) = extractions.next().await {
            match result {
                Ok(stream) => {
                    let wins = stream.working_external_self().is_some();
                    by_index.insert(index, stream);
                    if wins {
                        group_won = true;
                        break;
                    }
                }
                Err(e) => warn!(url = %url, error = %e, "stream extraction failed"),
            }
        }
        // Dropping `extractions` here cancels any still-in-flight probes
        // in this group once a winner is found.
        drop(extractions);

        if group_won {
            break;
        }
    }

    ResolvedEpisode {
        streams: by_index.into_values().collect(),
    }
}

/// The stream to hand a client: races `working_external_self` within
/// each priority group, highest priority first, falling through to the
/// next group only when nobody in the current one wins (§4.7 steps
/// 2–4). Extraction already happened concurrently in
/// [`resolve_episode`], so by the time this runs every candidate is a
/// plain value — "racing" here is just "first truthy in priority
/// order", the synchronous tail of the same race.
pub fn best_stream(resolved: &ResolvedEpisode) -> Option<&Stream> {
    let mut by_priority: BTreeMap<i32, Vec<&Stream>> = BTreeMap::new();
    for stream in &resolved.streams {
        by_priority.entry(stream.priority).or_default().push(stream);
    }

    by_priority
        .into_iter()
        .rev()
        .find_map(|(_priority, group)| group.into_iter().find_map(Stream::working_external_self))
}

/// Poster image: races `poster` across every resolved stream, first
/// non-null wins (§4.7).
pub fn best_poster(resolved: &ResolvedEpisode) -> Option<&str> {
    resolved.streams.iter().find_map(|s| s.poster.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::errors::ExtractError;

    struct Fixed {
        id: &'static str,
        priority: i32,
        pattern: &'static str,
        working: bool,
        external: bool,
        poster: Option<&'static str>,
    }

    #[async_trait]
    impl StreamExtractorFactory for Fixed {
        fn id(&self) -> &str {
            self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn can_handle(&self, url: &str) -> bool {
            url.contains(self.pattern)
        }

        async fn extract(&self, _request: &Request) -> Result<Stream, ExtractError> {
            Ok(Stream {
                extractor_id: self.id.to_string(),
                links: if self.working {
                    vec!["https://cdn.example.com/video.mp4".into()]
                } else {
                    vec![]
                },
                poster: self.poster.map(str::to_string),
                external: self.external,
                priority: self.priority,
            })
        }
    }

    async fn registry() -> StreamExtractorRegistry {
        let registry = StreamExtractorRegistry::new();
        registry
            .register(Arc::new(Fixed {
                id: "low",
                priority: 0,
                pattern: "low.example",
                working: true,
                external: true,
                poster: None,
            }))
            .await;
        registry
            .register(Arc::new(Fixed {
                id: "high-broken",
                priority: 10,
                pattern: "high.example",
                working: false,
                external: true,
                poster: Some("https://poster.example/high.jpg"),
            }))
            .await;
        registry.freeze().await;
        registry
    }

    #[tokio::test]
    async fn falls_through_to_lower_priority_when_higher_group_has_no_winner() {
        let registry = registry().await;
        let episode = Episode::new(0, vec!["https://high.example/1".into(), "https://low.example/1".into()]);
        let resolved = resolve_episode(&episode, &registry, &Client::new()).await;

        let winner = best_stream(&resolved).expect("a lower-priority stream should win");
        assert_eq!(winner.extractor_id, "low");
    }

    #[tokio::test]
    async fn poster_is_taken_from_any_resolved_stream() {
        let registry = registry().await;
        let episode = Episode::new(0, vec!["https://high.example/1".into()]);
        let resolved = resolve_episode(&episode, &registry, &Client::new()).await;

        assert_eq!(best_poster(&resolved), Some("https://poster.example/high.jpg"));
    }

    #[tokio::test]
    async fn unmatched_urls_are_dropped_without_error() {
        let registry = registry().await;
        let episode = Episode::new(0, vec!["https://unrelated.example/1".into()]);
        let resolved = resolve_episode(&episode, &registry, &Client::new()).await;

        assert!(resolved.streams.is_empty());
        assert!(best_stream(&resolved).is_none());
    }

    #[tokio::test]
    async fn no_winner_anywhere_returns_none() {
        let registry = registry().await;
        let episode = Episode::new(0, vec!["https://high.example/1".into()]);
        let resolved = resolve_episode(&episode, &registry, &Client::new()).await;

        assert!(best_stream(&resolved).is_none());
    }

    struct Counting {
        id: &'static str,
        priority: i32,
        pattern: &'static str,
        working: bool,
        probes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StreamExtractorFactory for Counting {
        fn id(&self) -> &str {
            self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn can_handle(&self, url: &str) -> bool {
            url.contains(self.pattern)
        }

        async fn extract(&self, _request: &Request) -> Result<Stream, ExtractError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(Stream {
                extractor_id: self.id.to_string(),
                links: if self.working {
                    vec!["https://cdn.example.com/video.mp4".into()]
                } else {
                    vec![]
                },
                poster: None,
                external: true,
                priority: self.priority,
            })
        }
    }

    /// S4: given priorities `[100, 100, 10]` where only the second
    /// (within the top group) is working, the third (a lower-priority
    /// group) is never probed at all.
    #[tokio::test]
    async fn lower_priority_group_is_never_probed_once_a_higher_group_wins() {
        let registry = StreamExtractorRegistry::new();
        let low_probes = Arc::new(AtomicUsize::new(0));

        registry
            .register(Arc::new(Counting {
                id: "top-broken",
                priority: 100,
                pattern: "top-a.example",
                working: false,
                probes: Arc::new(AtomicUsize::new(0)),
            }))
            .await;
        registry
            .register(Arc::new(Counting {
                id: "top-working",
                priority: 100,
                pattern: "top-b.example",
                working: true,
                probes: Arc::new(AtomicUsize::new(0)),
            }))
            .await;
        registry
            .register(Arc::new(Counting {
                id: "low",
                priority: 10,
                pattern: "low.example",
                working: true,
                probes: low_probes.clone(),
            }))
            .await;
        registry.freeze().await;

        let episode = Episode::new(
            0,
            vec![
                "https://top-a.example/1".into(),
                "https://top-b.example/1".into(),
                "https://low.example/1".into(),
            ],
        );
        let resolved = resolve_episode(&episode, &registry, &Client::new()).await;

        let winner = best_stream(&resolved).expect("the top-priority group has a winner");
        assert_eq!(winner.extractor_id, "top-working");
        assert_eq!(low_probes.load(Ordering::SeqCst), 0, "lower-priority group must never be probed");
    }
}
