//! TweakRunner - Templated Workflow Sweeps
//!
//! Runs node-graph image generation workflows many times, patching node
//! parameters on every run from a templated YAML "tweaks" file. Templates
//! can pick models from folders, cycle through files, draw random values
//! and expand prompt wildcards.
//!
//! # Architecture
//!
//! - [`wildcards`]: `{a|b}` / `__file__` prompt wildcard expansion
//! - [`template`]: template rendering and the functions available to it
//! - [`tweaks`]: node selectors and tweak specifications
//! - [`workflow`]: the two workflow graphs, loading, saving and patching
//! - [`execution`]: job queue and executors
//! - [`environment`]: persisted settings with environment overrides
//! - [`monitoring`]: execution timeline
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tweakrunner::environment::Settings;
//! use tweakrunner::execution::{FileExecutor, JobQueue};
//! use tweakrunner::template::TweakRenderer;
//! use tweakrunner::{Tweaks, Workflow};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let renderer = Arc::new(TweakRenderer::new(Settings::load_default()?));
//!     let tweaks = Tweaks::from_file(renderer, "sweep.yaml", "sweep")?;
//!     let workflow = Workflow::from_image("portrait.png")?;
//!
//!     let mut queue = JobQueue::new();
//!     queue.add(workflow, tweaks, 8, true)?;
//!     queue.start(&mut FileExecutor::new("output"))?;
//!     Ok(())
//! }
//! ```

pub mod environment;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod random;
pub mod template;
pub mod tweaks;
pub mod wildcards;
pub mod workflow;

// Re-export commonly used types
pub use error::{Result, TweakError};
pub use execution::{JobQueue, JobStatus};
pub use tweaks::{Selector, Tweak, Tweaks};
pub use workflow::{load_workflow, load_workflow_from_image, Workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "TweakRunner";
