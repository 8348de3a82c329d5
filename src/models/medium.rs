//! `Medium`: one record of a title at one source (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::languages::Language;
use crate::uid::{MediumType, Uid};

/// Canonical, storable record of a title at one source.
///
/// `uid` is the primary key; two `Medium`s with the same `uid` are the
/// same record and upsert replaces the prior value. `medium_id` is a
/// pure function of `title` (see [`Uid::create_medium_id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    pub uid: Uid,
    pub medium_type: MediumType,
    pub medium_id: String,
    pub source: String,
    pub language: Language,
    pub dubbed: bool,

    /// Original title. Any trailing `" (Dub)"` marker has already been
    /// stripped by the source extractor before this is constructed
    /// (derived invariant, §4.5).
    pub title: String,
    pub aliases: Vec<String>,

    /// Source-specific URL used to rehydrate state.
    pub href: String,

    pub thumbnail: Option<String>,
    pub episode_count: Option<u32>,

    pub updated: DateTime<Utc>,
}

impl Medium {
    /// Strip a trailing `" (Dub)"` suffix, returning the clean title and
    /// whether the suffix was present. Source extractors call this before
    /// constructing a `Medium` so `is_dub`/`title` stay consistent.
    pub fn split_dub_suffix(raw_title: &str) -> (String, bool) {
        const SUFFIX: &str = " (Dub)";
        if let Some(stripped) = raw_title.strip_suffix(SUFFIX) {
            (stripped.to_string(), true)
        } else {
            (raw_title.to_string(), false)
        }
    }

    pub fn new(
        medium_type: MediumType,
        source: impl Into<String>,
        raw_title: impl AsRef<str>,
        language: Language,
        href: impl Into<String>,
    ) -> Self {
        let (title, dubbed) = Self::split_dub_suffix(raw_title.as_ref());
        let medium_id = Uid::create_medium_id(&title);
        let source = source.into();

        let uid = Uid::create(
            medium_type,
            medium_id.clone(),
            Some(source.clone()),
            language,
            dubbed,
        );

        Self {
            uid,
            medium_type,
            medium_id,
            source,
            language,
            dubbed,
            title,
            aliases: Vec::new(),
            href: href.into(),
            thumbnail: None,
            episode_count: None,
            updated: Utc::now(),
        }
    }
}
