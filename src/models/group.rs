//! `MediumGroup`: in-memory cross-source clustering over `Medium`s
//! sharing `(medium_type, medium_id, language, dubbed)` (§3, C9).

use std::collections::BTreeSet;

use serde::Serialize;

use crate::errors::GrobberError;
use crate::languages::Language;
use crate::uid::{MediumType, Uid};

use super::medium::Medium;

/// Transient aggregation over `Medium`s. Never persisted; rebuilt on
/// demand by the grouping engine (`pipeline::grouping`).
#[derive(Debug, Clone, Serialize)]
pub struct MediumGroup {
    pub medium_type: MediumType,
    pub medium_id: String,
    pub language: Language,
    pub dubbed: bool,
    pub title: String,
    pub members: Vec<Medium>,
}

impl MediumGroup {
    /// Build a group from its first member.
    pub fn singleton(medium: Medium) -> Self {
        Self {
            medium_type: medium.medium_type,
            medium_id: medium.medium_id.clone(),
            language: medium.language,
            dubbed: medium.dubbed,
            title: medium.title.clone(),
            members: vec![medium],
        }
    }

    /// `uid` for the group: same grammar as a `Medium` uid but with
    /// `source = None`.
    pub fn uid(&self) -> Uid {
        Uid::create(
            self.medium_type,
            self.medium_id.clone(),
            None,
            self.language,
            self.dubbed,
        )
    }

    /// Union of aliases and thumbnails across members (§3: "union of
    /// aliases/thumbnails").
    pub fn aliases(&self) -> Vec<String> {
        let mut set = BTreeSet::new();
        for m in &self.members {
            set.insert(m.title.clone());
            set.extend(m.aliases.iter().cloned());
        }
        set.into_iter().collect()
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.members
            .iter()
            .find_map(|m| m.thumbnail.as_deref())
    }

    /// `max(nonnull episodeCounts)`.
    pub fn episode_count(&self) -> Option<u32> {
        self.members.iter().filter_map(|m| m.episode_count).max()
    }

    pub fn source_count(&self) -> usize {
        self.members.len()
    }

    /// Add a member, failing with `IncompatibleMedia` if it disagrees on
    /// the group key (§3 invariant).
    pub fn add_member(&mut self, medium: Medium) -> Result<(), GrobberError> {
        if medium.medium_type != self.medium_type
            || medium.medium_id != self.medium_id
            || medium.language != self.language
            || medium.dubbed != self.dubbed
        {
            return Err(GrobberError::IncompatibleMedia(format!(
                "medium {} does not share group key ({:?}, {}, {:?}, {})",
                medium.uid, self.medium_type, self.medium_id, self.language, self.dubbed
            )));
        }
        self.members.push(medium);
        Ok(())
    }

    /// Whether `medium` could join this group: same `(language, dubbed,
    /// medium_id)`, and its `episode_count` (if known) falls within
    /// `[min(existing) - 2, max(existing) + 2]`. With no existing counts,
    /// any candidate is accepted (§4.9, §9 Open Question: the
    /// single-member case is treated as "accept if within ±2", not the
    /// asymmetric "widen to minimum spread 4" variant).
    pub fn could_contain(&self, medium: &Medium) -> bool {
        if medium.language != self.language
            || medium.dubbed != self.dubbed
            || medium.medium_id != self.medium_id
        {
            return false;
        }

        let counts: Vec<u32> = self.members.iter().filter_map(|m| m.episode_count).collect();
        if counts.is_empty() {
            return true;
        }

        let Some(candidate) = medium.episode_count else {
            return true;
        };

        let min = *counts.iter().min().unwrap();
        let max = *counts.iter().max().unwrap();
        candidate + 2 >= min && candidate <= max + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid::MediumType;

    fn medium(title: &str, ep_count: Option<u32>) -> Medium {
        let mut m = Medium::new(MediumType::Anime, "src", title, Language::En, "/x");
        m.episode_count = ep_count;
        m
    }

    #[test]
    fn rejects_member_with_different_group_key() {
        let mut group = MediumGroup::singleton(medium("Naruto", Some(220)));
        let other = medium("One Piece", Some(1000));
        assert!(group.add_member(other).is_err());
    }

    #[test]
    fn accepts_member_within_tolerance() {
        let group = MediumGroup::singleton(medium("Naruto", Some(220)));
        let candidate = medium("Naruto", Some(221));
        assert!(group.could_contain(&candidate));
    }

    #[test]
    fn rejects_member_outside_tolerance() {
        let group = MediumGroup::singleton(medium("Naruto", Some(220)));
        let candidate = medium("Naruto", Some(500));
        assert!(!group.could_contain(&candidate));
    }

    #[test]
    fn accepts_any_episode_count_when_group_has_none() {
        let group = MediumGroup::singleton(medium("Naruto", None));
        let candidate = medium("Naruto", Some(999));
        assert!(group.could_contain(&candidate));
    }

    #[test]
    fn episode_count_is_max_of_nonnull() {
        let mut group = MediumGroup::singleton(medium("Naruto", Some(100)));
        group.add_member(medium("Naruto", Some(220))).unwrap();
        group.add_member(medium("Naruto", None)).unwrap();
        assert_eq!(group.episode_count(), Some(220));
    }
}
