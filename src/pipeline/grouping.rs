//! Grouping engine (C9): clusters per-source `Medium`s sharing a
//! normalized identity into `MediumGroup`s. Grounded in
//! `original_source/grobber/anime/group.py`'s `group_animes`/
//! `could_contain`/`get_anime_group`. The original drives this off an
//! `asyncio.Queue` producer/consumer pair so preloading can overlap with
//! clustering; here every `Medium` is already materialized by the time
//! grouping runs (the search pipeline and the index scraper both
//! persist eagerly), so the queue collapses into a single-pass loop
//! over an owned `Vec` — no I/O is left to overlap.

use crate::languages::Language;
use crate::models::{Medium, MediumGroup};
use crate::store::{DocumentStore, DocumentStoreExt};
use crate::uid::MediumType;

/// Cluster `media` via `MediumGroup::could_contain`. With
/// `unique_groups`, a medium joins at most the first matching group;
/// otherwise it joins every group it could belong to, producing
/// overlapping clusters for the caller to pick from by size (§4.9 step
/// 4). Group membership is keyed on `(medium_type, medium_id, language,
/// dubbed)`, which `could_contain` rules out mismatching before
/// `add_member` is ever called — `add_member`'s `IncompatibleMedia`
/// error can't fire here.
pub fn group_animes(media: Vec<Medium>, unique_groups: bool) -> Vec<MediumGroup> {
    let mut groups: Vec<MediumGroup> = Vec::new();

    for medium in media {
        let mut joined = false;
        for group in groups.iter_mut() {
            if group.could_contain(&medium) {
                let _ = group.add_member(medium.clone());
                joined = true;
                if unique_groups {
                    break;
                }
            }
        }
        if !joined {
            groups.push(MediumGroup::singleton(medium));
        }
    }

    groups
}

/// Resolve a UID with `source = None` back to its `MediumGroup`: every
/// stored `Medium` sharing `(medium_type, medium_id, language, dubbed)`,
/// clustered and reduced to the largest group when clustering still
/// yields more than one (§4.9's "tie-breaking... maximum member count").
pub async fn get_anime_group(
    store: &dyn DocumentStore,
    medium_type: MediumType,
    medium_id: &str,
    language: Language,
    dubbed: bool,
) -> Option<MediumGroup> {
    let candidates: Vec<Medium> = store
        .find_prefix::<Medium>("medium:")
        .await
        .into_iter()
        .filter(|m| m.medium_type == medium_type && m.medium_id == medium_id && m.language == language && m.dubbed == dubbed)
        .collect();

    if candidates.is_empty() {
        return None;
    }

    group_animes(candidates, false)
        .into_iter()
        .max_by_key(MediumGroup::source_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn medium(title: &str, source: &str, ep_count: Option<u32>) -> Medium {
        let mut m = Medium::new(MediumType::Anime, source, title, Language::En, "/x");
        m.episode_count = ep_count;
        m
    }

    #[test]
    fn unique_groups_clusters_into_one_group_per_identity() {
        let media = vec![
            medium("Naruto", "gogoanime", Some(220)),
            medium("Naruto", "nineanime", Some(221)),
            medium("One Piece", "gogoanime", Some(1000)),
        ];

        let groups = group_animes(media, true);
        assert_eq!(groups.len(), 2);
        let naruto = groups.iter().find(|g| g.title == "Naruto").unwrap();
        assert_eq!(naruto.source_count(), 2);
    }

    #[test]
    fn episode_count_outside_tolerance_starts_a_new_group() {
        let media = vec![medium("Naruto", "gogoanime", Some(220)), medium("Naruto", "nineanime", Some(9))];

        let groups = group_animes(media, true);
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn get_anime_group_picks_the_largest_cluster() {
        let store = MemoryStore::shared();
        for m in [
            medium("Naruto", "gogoanime", Some(220)),
            medium("Naruto", "nineanime", Some(221)),
            medium("Naruto", "animepahe", Some(9)),
        ] {
            store.upsert(&format!("medium:{}", m.uid), &m).await;
        }

        let group = get_anime_group(store.as_ref(), MediumType::Anime, "naruto", Language::En, false)
            .await
            .expect("a group should be found");
        assert_eq!(group.source_count(), 2);
    }

    #[tokio::test]
    async fn get_anime_group_returns_none_when_nothing_matches() {
        let store = MemoryStore::shared();
        let group = get_anime_group(store.as_ref(), MediumType::Anime, "missing", Language::En, false).await;
        assert!(group.is_none());
    }
}
