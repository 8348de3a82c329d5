//! Job scheduling subsystem.
//!
//! Drives the standing index-scrape schedule (§4.10: NEW daily,
//! ONGOING biweekly, FULL every sixteen weeks) plus ad-hoc maintenance
//! jobs, built around four components:
//! - `JobQueue`: thread-safe job storage with deduplication
//! - `JobScheduler`: enqueues standing jobs as they come due
//! - `JobQueueRunner`: pulls ready jobs and runs them under concurrency limits
//! - `JobExecutor`: runs the `IndexScraperRunner`s a job names

pub mod api;
pub mod job_executor;
pub mod job_queue;
pub mod job_queue_runner;
pub mod job_scheduler;
pub mod types;

pub use api::JobSchedulingApi;
pub use job_executor::JobExecutor;
pub use job_queue::JobQueue;
pub use job_queue_runner::JobQueueRunner;
pub use job_scheduler::JobScheduler;
pub use types::*;