//! `Request` (C1): a single logical HTTP fetch with lazy, memoized
//! derivations.
//!
//! Modeled after `original_source/grobber/request.py`'s `cached_property`
//! chain, rendered in Rust as `tokio::sync::OnceCell` fields — each one
//! single-flight by construction (a second caller awaiting
//! `get_or_try_init` observes the same in-flight computation rather than
//! triggering a second fetch). `reset()` clears every cell, matching the
//! original's `_dirty()` cascade.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::errors::FetchError;
use crate::url_pool::UrlPoolRegistry;

const DEFAULT_GET_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_HEAD_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 5;
const RETRY_STATUSES: [u16; 4] = [403, 429, 503, 529];
const STAGGER_BASE: Duration = Duration::from_millis(1000);
const STAGGER_FACTOR: f64 = 1.5;
const STAGGER_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
struct FetchedResponse {
    status: u16,
    body: String,
    content_type: Option<String>,
}

/// A single logical fetch. Cheap to construct; derivations are computed
/// (and cached) only when first awaited.
pub struct Request {
    client: Client,
    raw_url: String,
    params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    use_proxy: std::sync::atomic::AtomicBool,
    proxy_url: Option<String>,
    pools: Option<Arc<UrlPoolRegistry>>,

    url_cell: OnceCell<String>,
    response_cell: OnceCell<Result<FetchedResponse, FetchError>>,
    head_cell: OnceCell<Result<FetchedResponse, FetchError>>,
    text_cell: OnceCell<String>,
    json_cell: OnceCell<Option<Value>>,
}

/// Serializable state for rehydration (§4.1): `{url, params, headers,
/// timeout, use_proxy, options}`. Rehydrating produces an equivalent
/// `Request` with no cached derivations.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RequestState {
    pub url: String,
    #[serde(default)]
    pub params: Vec<(String, String)>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub use_proxy: bool,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            raw_url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
            timeout: None,
            use_proxy: std::sync::atomic::AtomicBool::new(false),
            proxy_url: None,
            pools: None,
            url_cell: OnceCell::new(),
            response_cell: OnceCell::new(),
            head_cell: OnceCell::new(),
            text_cell: OnceCell::new(),
            json_cell: OnceCell::new(),
        }
    }

    pub fn with_pools(mut self, pools: Arc<UrlPoolRegistry>) -> Self {
        self.pools = Some(pools);
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    pub fn from_state(state: RequestState, client: Client) -> Self {
        let mut req = Self::with_client(client, state.url)
            .with_params(state.params);
        req.headers = state.headers;
        req.timeout = state.timeout_secs.map(Duration::from_secs);
        req.use_proxy = std::sync::atomic::AtomicBool::new(state.use_proxy);
        req
    }

    pub fn state(&self) -> RequestState {
        RequestState {
            url: self.raw_url.clone(),
            params: self.params.clone(),
            headers: self.headers.clone(),
            timeout_secs: self.timeout.map(|d| d.as_secs()),
            use_proxy: self.use_proxy.load(std::sync::atomic::Ordering::Relaxed),
        }
    }

    /// Expand `{POOL}` placeholders against the registered `UrlPool`s.
    /// Placeholders are not distinguished as "proxied" here beyond the
    /// fact that any pool-backed placeholder forces the outbound proxy,
    /// per §4.1 ("certain placeholders are marked proxied").
    async fn expand_url(&self) -> String {
        let mut url = self.raw_url.clone();
        if let Some(pools) = &self.pools {
            while let (Some(start), Some(end)) = (url.find('{'), url.find('}')) {
                if end < start {
                    break;
                }
                let placeholder = url[start + 1..end].to_string();
                let Some(pool) = pools.get(&placeholder) else {
                    break;
                };
                self.use_proxy
                    .store(true, std::sync::atomic::Ordering::Relaxed);
                let resolved = pool.resolve().await.unwrap_or_default();
                url.replace_range(start..=end, &resolved);
            }
        }
        url
    }

    pub async fn url(&self) -> &str {
        self.url_cell
            .get_or_init(|| async { self.expand_url().await })
            .await
    }

    /// Clear every cached derivation, equivalent to the original's
    /// cascading `_dirty()`.
    pub fn reset(&mut self) {
        self.url_cell = OnceCell::new();
        self.response_cell = OnceCell::new();
        self.head_cell = OnceCell::new();
        self.text_cell = OnceCell::new();
        self.json_cell = OnceCell::new();
    }

    fn should_retry_with_proxy(status: StatusCode) -> bool {
        RETRY_STATUSES.contains(&status.as_u16())
    }

    async fn send(&self, method: Method, timeout: Duration) -> Result<FetchedResponse, FetchError> {
        let url = self.url().await.to_string();
        let mut attempts = 0u32;

        loop {
            let result = self.staggered_attempt(method.clone(), &url, timeout).await;

            match result {
                Ok(resp) => {
                    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK);
                    if Self::should_retry_with_proxy(status) && attempts < DEFAULT_MAX_RETRIES {
                        self.use_proxy
                            .store(true, std::sync::atomic::Ordering::Relaxed);
                        attempts += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(FetchError::Connection { .. }) if attempts < DEFAULT_MAX_RETRIES => {
                    self.use_proxy
                        .store(true, std::sync::atomic::Ordering::Relaxed);
                    attempts += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// (a) staggered concurrent attempts: a new attempt launches every
    /// doubling interval (1s, 1.5s, 2.25s…) until one resolves; losers
    /// are cancelled by being dropped when the `select!` returns.
    async fn staggered_attempt(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedResponse, FetchError> {
        use futures::stream::FuturesUnordered;
        use futures::StreamExt;

        let mut pending = FuturesUnordered::new();
        let mut interval = STAGGER_BASE;

        pending.push(Box::pin(self.one_attempt(method.clone(), url, timeout)));

        for _ in 1..STAGGER_ATTEMPTS {
            tokio::select! {
                biased;
                result = pending.next() => {
                    if let Some(result) = result {
                        return result;
                    }
                }
                _ = tokio::time::sleep(interval) => {
                    pending.push(Box::pin(self.one_attempt(method.clone(), url, timeout)));
                    interval = interval.mul_f64(STAGGER_FACTOR);
                }
            }
        }

        pending
            .next()
            .await
            .unwrap_or_else(|| {
                Err(FetchError::Timeout {
                    url: url.to_string(),
                })
            })
    }

    async fn one_attempt(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedResponse, FetchError> {
        let client = if self.use_proxy.load(std::sync::atomic::Ordering::Relaxed) {
            self.proxy_url
                .as_ref()
                .and_then(|proxy| reqwest::Proxy::all(proxy).ok())
                .and_then(|p| Client::builder().proxy(p).build().ok())
                .unwrap_or_else(|| self.client.clone())
        } else {
            self.client.clone()
        };

        let mut builder = client.request(method, url).timeout(timeout);

        if !self.params.is_empty() {
            builder = builder.query(&self.params);
        }
        for (k, v) in &self.headers {
            builder = builder.header(k, v);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Connection {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = resp.text().await.unwrap_or_default();

        Ok(FetchedResponse {
            status: status.as_u16(),
            body,
            content_type,
        })
    }

    pub async fn fetch(&self) -> Result<(), FetchError> {
        let result = self
            .response_cell
            .get_or_init(|| async { self.send(Method::GET, self.timeout.unwrap_or(DEFAULT_GET_TIMEOUT)).await })
            .await;
        result.as_ref().map(|_| ()).map_err(|e| e.clone())
    }

    /// (c) on HEAD 405, downgrade to GET.
    pub async fn head(&self) -> Result<u16, FetchError> {
        let result = self
            .head_cell
            .get_or_init(|| async {
                let timeout = self.timeout.unwrap_or(DEFAULT_HEAD_TIMEOUT);
                let resp = self.send(Method::HEAD, timeout).await;
                match resp {
                    Ok(r) if r.status == 405 => self.send(Method::GET, timeout).await,
                    other => other,
                }
            })
            .await;
        result.as_ref().map(|r| r.status).map_err(|e| e.clone())
    }

    /// Never throws; returns a boolean (§4.1).
    pub async fn head_success(&self) -> bool {
        match self.head().await {
            Ok(status) => (200..400).contains(&status),
            Err(e) => {
                warn!(error = %e, "couldn't head");
                false
            }
        }
    }

    /// Never throws; returns a boolean (§4.1).
    pub async fn success(&self) -> bool {
        self.fetch().await.ok();
        match self.response_cell.get() {
            Some(Ok(r)) => (200..400).contains(&r.status),
            _ => false,
        }
    }

    pub async fn text(&self) -> Result<&str, FetchError> {
        self.fetch().await?;
        let body = match self.response_cell.get() {
            Some(Ok(r)) => r.body.clone(),
            Some(Err(e)) => return Err(e.clone()),
            None => unreachable!("fetch() populates response_cell"),
        };
        Ok(self.text_cell.get_or_init(|| async { body }).await.as_str())
    }

    pub async fn json(&self) -> Result<Option<&Value>, FetchError> {
        let text = self.text().await?.to_string();
        Ok(self
            .json_cell
            .get_or_init(|| async move {
                match serde_json::from_str(&text) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        warn!(error = %e, "couldn't parse json");
                        None
                    }
                }
            })
            .await
            .as_ref())
    }

    /// HEAD probe that only accepts `video/*` content types — the
    /// shared helper stream extractors use (C6).
    pub async fn is_video_head(&self) -> bool {
        match self.head_cell.get() {
            Some(Ok(r)) => r
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("video/")),
            _ => {
                let _ = self.head().await;
                matches!(self.head_cell.get(), Some(Ok(r)) if r.content_type.as_deref().is_some_and(|ct| ct.starts_with("video/")))
            }
        }
    }

    pub fn use_proxy(&self) -> bool {
        self.use_proxy.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_statuses_match_spec() {
        for code in [403, 429, 503, 529] {
            assert!(Request::should_retry_with_proxy(StatusCode::from_u16(code).unwrap()));
        }
        assert!(!Request::should_retry_with_proxy(StatusCode::OK));
    }

    #[tokio::test]
    async fn state_round_trips_without_cached_derivations() {
        let req = Request::new("https://example.com/x").with_params(vec![("a".into(), "b".into())]);
        let state = req.state();
        let rehydrated = Request::from_state(state, Client::new());
        assert_eq!(rehydrated.raw_url, "https://example.com/x");
        assert_eq!(rehydrated.params, vec![("a".to_string(), "b".to_string())]);
        assert!(rehydrated.response_cell.get().is_none());
    }

    #[tokio::test]
    async fn expand_url_without_pools_is_identity() {
        let req = Request::new("https://example.com/no-placeholders");
        assert_eq!(req.url().await, "https://example.com/no-placeholders");
    }
}
