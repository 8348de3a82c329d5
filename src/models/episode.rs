//! `Episode`: bound to one `Medium` by 0-based index.

use serde::Serialize;

use super::stream::Stream;

/// One episode of a `Medium`. `raw_streams` are candidate host URLs
/// scraped from the episode page; `streams` are the verified extractor
/// instances derived from them lazily by the resolution engine
/// (`pipeline::resolution`), not stored here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub index: u32,
    pub raw_streams: Vec<String>,
}

impl Episode {
    pub fn new(index: u32, raw_streams: Vec<String>) -> Self {
        Self { index, raw_streams }
    }
}

/// A fully resolved episode: the `Stream`s dispatched from `raw_streams`
/// through the stream extractor registry, in registration order — this
/// is what `pipeline::resolution::resolve_episode` hands back as the
/// queryable `streams` list (§3, C7 `get(streamIndex)`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedEpisode {
    pub streams: Vec<Stream>,
}

impl ResolvedEpisode {
    pub fn get(&self, stream_index: usize) -> Option<&Stream> {
        self.streams.get(stream_index)
    }
}
