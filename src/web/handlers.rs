//! Thin route handlers (§6): parse query parameters into a
//! [`QueryRequest`], resolve through the engine, and respond. No
//! business logic lives here, matching the teacher's "thin handlers
//! delegate to the service layer" convention — the service layer here
//! is the query/pipeline modules rather than a SeaORM repository.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::errors::{GrobberError, LookupError};
use crate::languages::Language;
use crate::pipeline::{best_poster, best_stream, resolve_episode};
use crate::query::{AnimeRecord, QueryRequest};
use crate::uid::Uid;

use super::responses::handle_result;
use super::AppState;

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub anime: String,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub dubbed: bool,
    #[serde(default)]
    pub group: bool,
    pub results: Option<usize>,
}

/// `GET /anime/search?anime=&language=&dubbed=&results=&group=`
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let language = params.language.unwrap_or(Language::En);
    let num_results = params.results.unwrap_or(1);
    let result = crate::pipeline::search(
        &params.anime,
        language,
        params.dubbed,
        num_results,
        params.group,
        &state.sources,
        state.store.as_ref(),
    )
    .await;
    handle_result(result)
}

#[derive(Debug, Deserialize)]
pub struct AnimeParams {
    pub uid: Option<String>,
    pub anime: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub dubbed: bool,
    #[serde(default)]
    pub group: bool,
}

fn parse_request(params: &AnimeParams) -> Result<QueryRequest, GrobberError> {
    if let Some(uid) = &params.uid {
        return Ok(QueryRequest::Uid(Uid::parse(uid)?));
    }
    if let Some(anime) = &params.anime {
        return Ok(QueryRequest::Title {
            anime: anime.clone(),
            language: params.language.unwrap_or(Language::En),
            dubbed: params.dubbed,
            group: params.group,
        });
    }
    Err(GrobberError::InvalidRequest("either uid or anime must be supplied".to_string()))
}

/// `GET /anime/?uid=` or `?anime=&language=&dubbed=`
pub async fn get_anime(State(state): State<AppState>, Query(params): Query<AnimeParams>) -> Response {
    let result = async {
        let request = parse_request(&params)?;
        request.resolve(&state.sources, state.store.as_ref()).await
    }
    .await;
    handle_result(result)
}

/// The single `Medium` a resolved anime record should act on for
/// episode/stream purposes: itself if ungrouped, otherwise its first
/// member (spec.md is silent on which group member owns episode
/// lookups; this crate picks the first, consistent with the engine
/// never ranking members within a group).
fn representative_medium(record: AnimeRecord) -> Result<crate::models::Medium, GrobberError> {
    match record {
        AnimeRecord::Medium(m) => Ok(m),
        AnimeRecord::Group(g) => g.members.into_iter().next().ok_or_else(|| GrobberError::internal("empty group")),
    }
}

#[derive(Debug, Deserialize)]
pub struct EpisodeParams {
    pub uid: Option<String>,
    pub anime: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub dubbed: bool,
    #[serde(default)]
    pub group: bool,
    pub episode: u32,
}

impl EpisodeParams {
    fn anime_params(&self) -> AnimeParams {
        AnimeParams {
            uid: self.uid.clone(),
            anime: self.anime.clone(),
            language: self.language,
            dubbed: self.dubbed,
            group: self.group,
        }
    }
}

/// `GET /anime/episode/?…&episode=N`
pub async fn get_episode(State(state): State<AppState>, Query(params): Query<EpisodeParams>) -> Response {
    let result = async {
        let request = parse_request(&params.anime_params())?;
        let record = request.resolve(&state.sources, state.store.as_ref()).await?;
        let medium = representative_medium(record)?;
        let source = state
            .sources
            .get(&medium.source)
            .await
            .ok_or_else(|| LookupError::SourceNotFound(medium.source.clone()))?;
        source.get_episode(&medium, params.episode).await.map_err(GrobberError::from)
    }
    .await;
    handle_result(result)
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub uid: Option<String>,
    pub anime: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub dubbed: bool,
    #[serde(default)]
    pub group: bool,
    pub episode: u32,
    pub stream: usize,
}

impl StreamParams {
    fn episode_params(&self) -> EpisodeParams {
        EpisodeParams {
            uid: self.uid.clone(),
            anime: self.anime.clone(),
            language: self.language,
            dubbed: self.dubbed,
            group: self.group,
            episode: self.episode,
        }
    }
}

/// `GET /anime/stream/?…&episode=N&stream=K`
pub async fn get_stream(State(state): State<AppState>, Query(params): Query<StreamParams>) -> Response {
    let result = async {
        let resolved = resolve_for(&state, &params.episode_params()).await?;
        resolved
            .get(params.stream)
            .cloned()
            .ok_or(GrobberError::Lookup(LookupError::StreamNotFound(params.stream)))
    }
    .await;
    handle_result(result)
}

/// Fetch `params.episode` for whatever anime `params` describes and
/// resolve its raw streams through the stream extractor registry.
async fn resolve_for(state: &AppState, params: &EpisodeParams) -> Result<crate::models::ResolvedEpisode, GrobberError> {
    let request = parse_request(&params.anime_params())?;
    let record = request.resolve(&state.sources, state.store.as_ref()).await?;
    let medium = representative_medium(record)?;
    let source = state
        .sources
        .get(&medium.source)
        .await
        .ok_or_else(|| LookupError::SourceNotFound(medium.source.clone()))?;
    let episode = source.get_episode(&medium, params.episode).await?;
    Ok(resolve_episode(&episode, &state.stream_registry, &state.http_client).await)
}

#[derive(Debug, Deserialize)]
pub struct UidEpisodePath {
    pub uid: String,
    pub episode: u32,
}

fn episode_params_for(path: &UidEpisodePath) -> EpisodeParams {
    EpisodeParams {
        uid: Some(path.uid.clone()),
        anime: None,
        language: None,
        dubbed: false,
        group: false,
        episode: path.episode,
    }
}

/// `GET /anime/source/{uid}/{episode}` -> 302 to the best working link,
/// 404 if none.
pub async fn redirect_source(State(state): State<AppState>, Path(path): Path<UidEpisodePath>) -> Response {
    let params = episode_params_for(&path);
    let result = async {
        let resolved = resolve_for(&state, &params).await?;
        best_stream(&resolved)
            .and_then(|s| s.links.first())
            .cloned()
            .ok_or(GrobberError::Lookup(LookupError::StreamNotFound(0)))
    }
    .await;

    match result {
        Ok(link) => Redirect::to(&link).into_response(),
        Err(error) => super::responses::handle_error(&error),
    }
}

/// `GET /anime/poster/{uid}/{episode}` -> 302 to a poster image.
pub async fn redirect_poster(State(state): State<AppState>, Path(path): Path<UidEpisodePath>) -> Response {
    let params = episode_params_for(&path);
    let result = async {
        let resolved = resolve_for(&state, &params).await?;
        best_poster(&resolved).map(str::to_string).ok_or(GrobberError::Lookup(LookupError::StreamNotFound(0)))
    }
    .await;

    match result {
        Ok(link) => Redirect::to(&link).into_response(),
        Err(error) => super::responses::handle_error(&error),
    }
}
