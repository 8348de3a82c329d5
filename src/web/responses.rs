//! HTTP response shape for the web layer (§6), grounded in the
//! teacher's `web::responses` `ApiResponse`/`handle_error` pair —
//! trimmed to the subset this crate's thin router needs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::errors::{GrobberError, LookupError};

/// Standard JSON envelope for every non-redirect response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// `Ok(data)` becomes a `200` envelope; `Err` is mapped per error kind.
pub fn handle_result<T: Serialize>(result: Result<T, GrobberError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(error) => handle_error(&error),
    }
}

/// Map each `GrobberError` variant to its status code (§7 propagation
/// policy: lookup misses and invalid requests pass through unmodified,
/// everything else is an opaque internal error to the caller).
pub fn handle_error(error: &GrobberError) -> Response {
    let (status, message) = match error {
        GrobberError::InvalidRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
        GrobberError::Uid(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        GrobberError::Lookup(LookupError::UidUnknown(_) | LookupError::AnimeNotFound(_) | LookupError::SourceNotFound(_)) => {
            (StatusCode::NOT_FOUND, error.to_string())
        }
        GrobberError::Lookup(LookupError::EpisodeNotFound { .. } | LookupError::StreamNotFound(_)) => {
            (StatusCode::NOT_FOUND, error.to_string())
        }
        GrobberError::Fetch(_) | GrobberError::Extract(_) => (StatusCode::BAD_GATEWAY, error.to_string()),
        GrobberError::IncompatibleMedia(_) => (StatusCode::UNPROCESSABLE_ENTITY, error.to_string()),
        GrobberError::NoWorkingUrl { .. } => (StatusCode::BAD_GATEWAY, error.to_string()),
        GrobberError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    };

    (status, Json(ApiResponse::<()>::error(message))).into_response()
}
