//! Error type definitions for the aggregator.
//!
//! The shape mirrors a hierarchical error system: a top-level
//! [`GrobberError`] wraps layer-specific enums, each carrying just enough
//! context to be logged or translated to a status code at the HTTP
//! boundary. `ExtractError` and per-source `FetchError`s are intentionally
//! swallowed inside the search fan-out (see `pipeline::search`) rather
//! than propagated here; they only reach this enum when there is no
//! fallback left.

use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum GrobberError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Uid(#[from] UidError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("incompatible media: {0}")]
    IncompatibleMedia(String),

    #[error("no working url for pool {pool}")]
    NoWorkingUrl { pool: String },

    #[error("internal error ({correlation_id}): {message}")]
    Internal {
        message: String,
        correlation_id: uuid::Uuid,
    },
}

impl GrobberError {
    /// Build the catch-all "generic internal error with a correlation id"
    /// variant described for propagation policy.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            correlation_id: uuid::Uuid::new_v4(),
        }
    }
}

/// UID parsing/construction errors (C4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UidError {
    #[error("invalid uid: {0:?}")]
    Invalid(String),

    #[error("unknown language code: {0:?}")]
    UnknownLanguage(String),
}

/// Lookup misses at each level of the Query -> Medium -> Episode -> Stream
/// hierarchy. These surface to callers unmodified (spec §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("uid {0} is syntactically valid but has no record")]
    UidUnknown(String),

    #[error("no anime found for {0:?}")]
    AnimeNotFound(String),

    #[error("episode {index} not found (episode_count={episode_count})")]
    EpisodeNotFound { index: u32, episode_count: u32 },

    #[error("stream {0} not found")]
    StreamNotFound(usize),

    #[error("source {0:?} not found")]
    SourceNotFound(String),
}

/// HTTP/network failure, wrapped with status when known (C1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("connection error fetching {url}: {message}")]
    Connection { url: String, message: String },

    #[error("unexpected status {status} fetching {url}")]
    Status { url: String, status: u16 },
}

/// A source or stream extractor could not parse its input. Always logged,
/// never surfaced past the fan-out boundary — the offending source is
/// treated as if it yielded nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("extractor {extractor:?} failed: {message}")]
pub struct ExtractError {
    pub extractor: String,
    pub message: String,
}

impl ExtractError {
    pub fn new(extractor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            extractor: extractor.into(),
            message: message.into(),
        }
    }
}
