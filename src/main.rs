use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grobber::config::Config;
use grobber::index_scraper::IndexScraperRegistry;
use grobber::job_scheduling::{JobExecutor, JobQueue, JobQueueRunner, JobScheduler};
use grobber::sources::SourceRegistry;
use grobber::store::{DocumentStore, MemoryStore};
use grobber::streams::StreamExtractorRegistry;
use grobber::web::{AppState, WebServer};

#[derive(Parser)]
#[command(name = "grobber")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-source anime aggregator: search, grouping, and stream resolution")]
struct Cli {
    /// Configuration file path (defaults to `grobber.toml` in the working directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Listening IP address (overrides config)
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port (overrides config)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level (overrides RUST_LOG)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("grobber={}", cli.log_level).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting grobber v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(cli.config)?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let store: Arc<dyn DocumentStore> = MemoryStore::shared();
    let sources = Arc::new(SourceRegistry::new());

    // Concrete site parsers (C5) and stream extractors (C6) are
    // out of scope (§1 Non-goals: third-party site parsing specifics);
    // a real deployment registers them here before freezing.
    let stream_registry = Arc::new(StreamExtractorRegistry::new());
    stream_registry.freeze().await;

    let index_scrapers = Arc::new(IndexScraperRegistry::new());

    let job_queue = Arc::new(JobQueue::new());
    let job_executor = Arc::new(JobExecutor::new(index_scrapers.clone(), store.clone()));
    let job_queue_runner = JobQueueRunner::new(job_queue.clone(), job_executor, &config.job_scheduling);
    let job_scheduler = JobScheduler::new(job_queue.clone(), store.clone(), config.job_scheduling.clone());

    let shutdown = CancellationToken::new();

    let scheduler_shutdown = shutdown.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = job_scheduler.run(scheduler_shutdown).await {
            tracing::error!(error = %e, "job scheduler stopped with an error");
        }
    });

    let runner_shutdown = shutdown.clone();
    let runner_handle = tokio::spawn(async move {
        if let Err(e) = job_queue_runner.run(runner_shutdown).await {
            tracing::error!(error = %e, "job queue runner stopped with an error");
        }
    });

    let state = AppState {
        store,
        sources,
        stream_registry,
        http_client: reqwest::Client::new(),
    };
    let web_server = WebServer::new(&config, state)?;
    info!(addr = %web_server.addr(), "listening");

    let server_shutdown = shutdown.clone();
    web_server
        .serve(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    scheduler_handle.await?;
    runner_handle.await?;

    Ok(())
}
