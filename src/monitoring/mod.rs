//! Monitoring Module
//!
//! Timing of job repetitions during queue runs.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: repetition start/end timing and an ASCII chart

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
