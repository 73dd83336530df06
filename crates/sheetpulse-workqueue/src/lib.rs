//! # SheetPulse Work Queue
//!
//! Durable queue of sync jobs and the worker pool that drains it.
//!
//! ## Features
//!
//! - FIFO delivery by run time, at-least-once
//! - Exponential backoff and a dead-letter status
//! - Global rolling-window rate limit on job starts
//! - Stall flagging and crash recovery of in-flight jobs
//! - SQLite and in-memory job stores

pub mod error;
pub mod handler;
pub mod queue;
pub mod rate_limit;
pub mod registry;
pub mod sqlite;
pub mod store;
pub mod worker;

pub use error::JobError;
pub use handler::{JobHandler, SyncJobHandler};
pub use queue::DurableQueue;
pub use rate_limit::RateLimiter;
pub use registry::ExecutorRegistry;
pub use sqlite::SqliteJobStore;
pub use store::{JobStore, MemoryJobStore};
pub use worker::{Worker, WorkerPool};
