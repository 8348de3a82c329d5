//! `SearchResult`: one entry of a search pipeline response (§4.8).

use serde::Serialize;

use super::group::MediumGroup;
use super::medium::Medium;

/// Either a single `Medium` (ungrouped search) or a `MediumGroup`
/// (grouped search), paired with a certainty score.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnimeResult {
    Single(Medium),
    Group(MediumGroup),
}

impl AnimeResult {
    pub fn title(&self) -> &str {
        match self {
            AnimeResult::Single(m) => &m.title,
            AnimeResult::Group(g) => &g.title,
        }
    }

    pub fn episode_count(&self) -> Option<u32> {
        match self {
            AnimeResult::Single(m) => m.episode_count,
            AnimeResult::Group(g) => g.episode_count(),
        }
    }

    pub fn source_count(&self) -> usize {
        match self {
            AnimeResult::Single(_) => 1,
            AnimeResult::Group(g) => g.members.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub anime: AnimeResult,
    pub certainty: f64,
}
