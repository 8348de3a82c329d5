//! Configuration default values.
//!
//! One central location for defaults, mirroring the teacher's
//! `config::defaults` convention.

// Document store defaults (C12 — `MONGO_URI`/`MONGO_DB` in spec.md §6,
// realized as an in-memory store unless a real backend is wired in).
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_MONGO_DB: &str = "grobber";

// Web server defaults (HOST_URL, ambient `axum` stub, §6).
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Request (C1) defaults.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEAD_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

// UrlPool (C2) defaults.
pub const DEFAULT_URL_POOL_TTL_SECS: u64 = 3600;

// Index scraper (C10) defaults.
pub const DEFAULT_MAX_PAGE_INDEX: u32 = 80;
pub const DEFAULT_SCRAPE_DELAY_SECS: u64 = 2;

// Job scheduling defaults — standing schedule per spec.md §4.10's fixed
// table (NEW daily, ONGOING biweekly, FULL every 16 weeks).
pub const DEFAULT_NEW_SCRAPE_CRON: &str = "0 0 0 * * *";
pub const DEFAULT_ONGOING_SCRAPE_INTERVAL: &str = "14d";
pub const DEFAULT_FULL_SCRAPE_INTERVAL: &str = "112d";
pub const DEFAULT_SCHEDULER_TICK: &str = "1m";
pub const DEFAULT_GLOBAL_MAX_JOBS: usize = 4;
pub const DEFAULT_CATEGORY_CONCURRENCY_LIMIT: usize = 1;
