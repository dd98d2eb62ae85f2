//! Template Rendering Module
//!
//! Renders a tweaks template (Jinja syntax) with a fixed table of native
//! functions and filters, and an `iteration` counter.
//!
//! # Structure
//!
//! - [`registry`]: the function table and the state it runs against
//! - [`functions`]: native implementations of every registered callable
//! - [`folders`]: recursive folder listings, list filters and cycle cursors
//! - [`image`]: copying images into the configured input folder
//! - [`renderer`]: [`TweakRenderer`], the entry point used by tweaks

pub mod folders;
pub mod functions;
pub mod image;
pub mod registry;
pub mod renderer;

use std::path::PathBuf;

use thiserror::Error;

use crate::wildcards::WildcardError;

pub use folders::{CycleKey, CycleStore, ListingKind};
pub use registry::{FunctionContext, FunctionKind, Registration, FUNCTIONS};
pub use renderer::TweakRenderer;

/// Failures raised by registered template functions.
///
/// These surface to the template engine as `invalid operation` errors that
/// keep the function error as their source. Wildcard failures come back out
/// of [`TweakRenderer::render`] as [`crate::error::TweakError::Wildcard`],
/// everything else as [`crate::error::TemplateRenderError::Render`].
#[derive(Error, Debug)]
pub enum FunctionError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("No files in '{folder}' match '{glob}'")]
    NoMatches { folder: String, glob: String },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("Cannot choose from an empty list")]
    EmptyChoice,

    #[error("Invalid range: {min} to {max}")]
    InvalidRange { min: String, max: String },

    #[error("Failed to access '{}': {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Failed to load image '{}': {message}", .path.display())]
    Image { path: PathBuf, message: String },

    #[error("Key {key} not found in '{}'", .path.display())]
    MissingKey { path: PathBuf, key: String },

    #[error(transparent)]
    Wildcard(#[from] WildcardError),
}

impl FunctionError {
    /// Finds the wildcard failure behind a template error, if there is one.
    pub(crate) fn wildcard_cause(err: &minijinja::Error) -> Option<&WildcardError> {
        let mut cause: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
        while let Some(current) = cause {
            if let Some(FunctionError::Wildcard(wildcard)) = current.downcast_ref::<FunctionError>() {
                return Some(wildcard);
            }
            cause = current.source();
        }
        None
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<FunctionError> for minijinja::Error {
    fn from(err: FunctionError) -> Self {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, err.to_string())
            .with_source(err)
    }
}
