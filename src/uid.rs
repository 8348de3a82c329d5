//! Canonical identifier scheme (C4): `mediumType-mediumId-source-language[_dub]`.
//!
//! Two grammars are accepted on parse, grounded in the two regexes the
//! original scraper carried side by side for backwards compatibility:
//!
//! - canonical: `type-mediumId-source-lang[_dub]` or the group form
//!   `type-mediumId-lang[_dub]` (no source).
//! - legacy (anime only): `source-mediumId-lang[_dub]`.
//!
//! Construction always produces the canonical string form.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::UidError;
use crate::languages::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediumType {
    #[serde(rename = "a")]
    Anime,
    #[serde(rename = "m")]
    Manga,
}

impl MediumType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediumType::Anime => "a",
            MediumType::Manga => "m",
        }
    }
}

impl std::str::FromStr for MediumType {
    type Err = UidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(MediumType::Anime),
            "m" => Ok(MediumType::Manga),
            other => Err(UidError::Invalid(other.to_string())),
        }
    }
}

// medium_type-medium_id(-source)?-language(_dub)?
static RE_UID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^-]+)-([^-]+)(?:-([^-]+))?-([^-]+?)(_dub)?$").unwrap());
// source-medium_id-language(_dub)?  (legacy, anime-only)
static RE_LEGACY_UID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-(.+)-(.+?)(_dub)?$").unwrap());

/// A parsed, canonical identifier for a [`crate::models::Medium`] or a
/// `MediumGroup` (when `source` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Uid {
    pub medium_type: MediumType,
    pub medium_id: String,
    pub source: Option<String>,
    pub language: Language,
    pub dubbed: bool,
}

impl Uid {
    pub fn create(
        medium_type: MediumType,
        medium_id: impl Into<String>,
        source: Option<String>,
        language: Language,
        dubbed: bool,
    ) -> Self {
        Self {
            medium_type,
            medium_id: medium_id.into(),
            source,
            language,
            dubbed,
        }
    }

    /// Deterministic function of a title: lowercase, strip whitespace,
    /// and escape every non-alphanumeric codepoint as `_<hex>_`.
    pub fn create_medium_id(title: &str) -> String {
        let normalized: String = title
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let mut out = String::with_capacity(normalized.len());
        for c in normalized.chars() {
            if c.is_alphanumeric() {
                out.push(c);
            } else {
                out.push_str(&format!("_{:x}_", c as u32));
            }
        }
        out
    }

    pub fn parse(s: &str) -> Result<Self, UidError> {
        // RE_UID's type segment is unconstrained ("[^-]+"), so it also
        // matches legacy strings whose first segment is a source id
        // rather than "a"/"m" (e.g. "gogoanime-naruto-en"). Only accept
        // the canonical match when the type and language segments are
        // actually valid; otherwise fall through to the legacy grammar
        // instead of propagating the parse error.
        if let Some(caps) = RE_UID.captures(s) {
            if let (Ok(medium_type), Ok(language)) =
                (caps[1].parse::<MediumType>(), caps[4].parse::<Language>())
            {
                let medium_id = caps[2].to_string();
                let source = caps.get(3).map(|m| m.as_str().to_string());
                let dubbed = caps.get(5).is_some();

                return Ok(Self {
                    medium_type,
                    medium_id,
                    source,
                    language,
                    dubbed,
                });
            }
        }

        if let Some(caps) = RE_LEGACY_UID.captures(s) {
            let source = caps[1].to_string();
            let medium_id = caps[2].to_string();
            let language: Language = caps[3]
                .parse()
                .map_err(|_| UidError::UnknownLanguage(caps[3].to_string()))?;
            let dubbed = caps.get(4).is_some();

            return Ok(Self {
                medium_type: MediumType::Anime,
                medium_id,
                source: Some(source),
                language,
                dubbed,
            });
        }

        Err(UidError::Invalid(s.to_string()))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self
            .source
            .as_ref()
            .map(|s| format!("-{s}"))
            .unwrap_or_default();
        let dub = if self.dubbed { "_dub" } else { "" };
        write!(
            f,
            "{}-{}{}-{}{}",
            self.medium_type.as_str(),
            self.medium_id,
            source,
            self.language.as_str(),
            dub
        )
    }
}

impl std::str::FromStr for Uid {
    type Err = UidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uid::parse(s)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.to_string()
    }
}

impl TryFrom<String> for Uid {
    type Error = UidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Uid::parse(&value)
    }
}
