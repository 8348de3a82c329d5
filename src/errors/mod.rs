//! Centralized error handling for the aggregator.
//!
//! Error kinds mirror the taxonomy in the engine's design: lookup misses,
//! extractor/fetch failures that get swallowed at task boundaries, and
//! client-visible request errors.

pub mod types;

pub use types::*;

/// Convenience alias for Results using [`GrobberError`].
pub type GrobberResult<T> = Result<T, GrobberError>;

/// Convenience alias for fetch-layer Results.
pub type FetchResult<T> = Result<T, FetchError>;

/// Convenience alias for lookup Results.
pub type LookupResult<T> = Result<T, LookupError>;
