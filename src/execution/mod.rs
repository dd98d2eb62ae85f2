//! Job Execution Module
//!
//! Queues workflow/tweaks pairs and runs them repetition by repetition,
//! with stop/resume and pause flag control.
//!
//! # Architecture
//!
//! - [`job`]: a workflow, its tweaks and its progress
//! - [`executor`]: the [`JobExecutor`] seam and local executors
//! - [`queue`]: sequential queue driving jobs through an executor

pub mod executor;
pub mod job;
pub mod queue;

pub use executor::{DryRunExecutor, ExecutionOutput, FileExecutor, JobExecutor};
pub use job::{Job, JobId, JobStatus};
pub use queue::{JobQueue, QueueControl, QueueOutcome};
