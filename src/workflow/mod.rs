//! Workflow Definition Module
//!
//! Provides the two-document workflow model, loading from PNG metadata or
//! JSON files, and tweak application.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (PresentationGraph, ExecutionGraph, Workflow)
//! - [`parser`]: PNG/JSON loading and saving
//! - [`patch`]: Applying tweaks to both graphs

pub mod model;
pub mod parser;
pub mod patch;

pub use model::{ExecutionGraph, PresentationGraph, Workflow};
pub use parser::{load_workflow, load_workflow_from_image, save_workflow};
