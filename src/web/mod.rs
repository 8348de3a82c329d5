//! Thin HTTP surface (§6): proves the engine is callable end-to-end
//! without reimplementing the full API spec.md describes. Grounded in
//! the teacher's `web::WebServer`/`AppState`/`create_router` shape —
//! one `AppState` carrying every shared collaborator, a `Router` built
//! once at startup, `CorsLayer::permissive()` the same as the teacher.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use reqwest::Client;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::sources::SourceRegistry;
use crate::store::DocumentStore;
use crate::streams::StreamExtractorRegistry;

pub mod handlers;
pub mod responses;

/// Shared, cheaply-cloned handle to every collaborator a route handler
/// needs. Mirrors the teacher's `AppState` (there: `database`,
/// `config`, service layer handles); here: the document store, the
/// frozen registries, and an http client for stream resolution.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub sources: Arc<SourceRegistry>,
    pub stream_registry: Arc<StreamExtractorRegistry>,
    pub http_client: Client,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> anyhow::Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self {
            app: Self::create_router(state),
            addr,
        })
    }

    fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/anime/search", get(handlers::search))
            .route("/anime/", get(handlers::get_anime))
            .route("/anime/episode/", get(handlers::get_episode))
            .route("/anime/stream/", get(handlers::get_stream))
            .route("/anime/source/{uid}/{episode}", get(handlers::redirect_source))
            .route("/anime/poster/{uid}/{episode}", get(handlers::redirect_poster))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` resolves, matching the teacher's
    /// `axum::serve(listener, app).with_graceful_shutdown(...)` idiom.
    pub async fn serve(self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).with_graceful_shutdown(shutdown).await?;
        Ok(())
    }
}
