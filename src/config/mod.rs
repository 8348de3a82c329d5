//! Layered configuration, grounded in the teacher's `config::mod`
//! figment-based layering (Toml file, then environment overrides).
//!
//! Config inputs match spec.md §6 verbatim: `MONGO_URI`, `MONGO_DB`,
//! `PROXY_URL`, `CHROME_WS`, `HOST_URL`; the teacher's richer per-domain
//! sub-config shape (`DatabaseConfig`/`WebConfig`/...) is kept for the
//! ambient concerns (scheduling limits, request timeouts) that have a
//! genuine counterpart here, dropping `StorageConfig`/`IngestionConfig`
//! (logo/M3U/EPG file paths) and the relay/proxy-generation/metrics
//! sub-configs, which have no SPEC_FULL counterpart.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub web: WebConfig,
    pub request: RequestConfig,
    pub index_scraper: IndexScraperConfig,
    pub job_scheduling: JobSchedulingConfig,
}

impl Config {
    /// Layer a `grobber.toml` (if present) under process environment
    /// variables prefixed `GROBBER_`, matching the teacher's
    /// `Figment::from(Toml::file(..)).merge(Env::prefixed(..))` idiom.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(Config::default()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        } else {
            figment = figment.merge(Toml::file("grobber.toml"));
        }

        figment
            .merge(Env::prefixed("GROBBER_").split("_"))
            .extract()
            .context("failed to load configuration")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            web: WebConfig::default(),
            request: RequestConfig::default(),
            index_scraper: IndexScraperConfig::default(),
            job_scheduling: JobSchedulingConfig::default(),
        }
    }
}

/// Document store connection (C12). The engine itself only depends on
/// `DocumentStore`; this config exists so a real deployment can wire a
/// Mongo-backed implementation in behind it without touching the rest
/// of the crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub mongo_uri: String,
    pub mongo_db: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            mongo_db: DEFAULT_MONGO_DB.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// `HOST_URL` — the externally visible base URL, used to build
    /// absolute links in query-layer responses.
    pub host_url: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            host_url: None,
        }
    }
}

/// Request (C1) tuning: timeouts, retry budget, and the outbound proxy
/// (`PROXY_URL`) / headless-render endpoint (`CHROME_WS`) spec.md §6
/// names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    #[serde(with = "duration_serde::duration")]
    pub timeout: Duration,
    #[serde(with = "duration_serde::duration")]
    pub head_timeout: Duration,
    pub max_retries: u32,
    pub proxy_url: Option<String>,
    pub chrome_ws: Option<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            head_timeout: Duration::from_secs(DEFAULT_HEAD_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            proxy_url: None,
            chrome_ws: None,
        }
    }
}

/// Index scraper (C10) tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexScraperConfig {
    pub max_page_index: u32,
    #[serde(with = "duration_serde::duration")]
    pub scrape_delay: Duration,
}

impl Default for IndexScraperConfig {
    fn default() -> Self {
        Self {
            max_page_index: DEFAULT_MAX_PAGE_INDEX,
            scrape_delay: Duration::from_secs(DEFAULT_SCRAPE_DELAY_SECS),
        }
    }
}

/// Job scheduling (C10) standing schedule and concurrency limits,
/// grounded in `original_source/grobber/index_scraper/schedule.py`'s
/// three triggers and the teacher's `JobSchedulingConfig` concurrency
/// knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSchedulingConfig {
    /// Cron expression for the NEW category (daily).
    pub new_scrape_cron: String,
    /// How long since the last ONGOING run before it's due again.
    #[serde(with = "duration_serde::duration")]
    pub ongoing_scrape_interval: Duration,
    /// How long since the last FULL run before it's due again.
    #[serde(with = "duration_serde::duration")]
    pub full_scrape_interval: Duration,
    /// How often the scheduler checks whether a standing job is due.
    #[serde(with = "duration_serde::duration")]
    pub scheduler_tick: Duration,
    pub global_max_jobs: usize,
    pub category_concurrency_limit: usize,
}

impl Default for JobSchedulingConfig {
    fn default() -> Self {
        Self {
            new_scrape_cron: DEFAULT_NEW_SCRAPE_CRON.to_string(),
            ongoing_scrape_interval: humantime::parse_duration(DEFAULT_ONGOING_SCRAPE_INTERVAL)
                .expect("DEFAULT_ONGOING_SCRAPE_INTERVAL is a valid duration literal"),
            full_scrape_interval: humantime::parse_duration(DEFAULT_FULL_SCRAPE_INTERVAL)
                .expect("DEFAULT_FULL_SCRAPE_INTERVAL is a valid duration literal"),
            scheduler_tick: humantime::parse_duration(DEFAULT_SCHEDULER_TICK)
                .expect("DEFAULT_SCHEDULER_TICK is a valid duration literal"),
            global_max_jobs: DEFAULT_GLOBAL_MAX_JOBS,
            category_concurrency_limit: DEFAULT_CATEGORY_CONCURRENCY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config::default();
        assert_eq!(config.store.mongo_db, "grobber");
        assert_eq!(config.web.port, DEFAULT_PORT);
        assert_eq!(config.job_scheduling.global_max_jobs, DEFAULT_GLOBAL_MAX_JOBS);
    }

    #[test]
    fn load_without_a_toml_file_falls_back_to_defaults() {
        let config = Config::load(Some(PathBuf::from("does-not-exist.toml"))).unwrap();
        assert_eq!(config.web.host, DEFAULT_HOST);
    }
}
