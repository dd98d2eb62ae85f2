//! Error Types
//!
//! Every failure in the tweak pipeline surfaces as a [`TweakError`]. The
//! narrower enums exist so callers can match on the stage that failed:
//! selector resolution, field lookup, template rendering, wildcard
//! expansion or image metadata extraction.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::wildcards::WildcardError;

/// Which of the two workflow documents an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    /// The `workflow` document (UI graph with positional widget values)
    Presentation,
    /// The `prompt` document (node id -> named inputs)
    Execution,
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Presentation => write!(f, "presentation"),
            Self::Execution => write!(f, "execution"),
        }
    }
}

/// Invalid, missing or ambiguous node selectors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Invalid selector: {0}")]
    Invalid(String),

    #[error("Node with the provided {selector} not found in the {graph} graph")]
    NotFound { graph: GraphKind, selector: String },

    #[error("Multiple nodes match {selector} in the {graph} graph ({count} found)")]
    NonUnique {
        graph: GraphKind,
        selector: String,
        count: usize,
    },
}

/// A tweak names a field the selected node does not have.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeFieldError {
    #[error("Field \"{field}\" was not found for selector {selector}")]
    MissingField { selector: String, field: String },

    #[error(
        "Field \"{field}\" of {selector} maps to widget slot {index}, but the node only has {available} widget values"
    )]
    MissingWidget {
        selector: String,
        field: String,
        index: usize,
        available: usize,
    },
}

/// The tweaks template could not be turned into a list of tweaks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateRenderError {
    #[error("Failed to render tweaks template: {0}")]
    Render(String),

    #[error("Rendered tweaks are not valid YAML: {0}")]
    Yaml(String),

    #[error("Rendered tweaks document has no `tweaks` list")]
    MissingTweaks,
}

/// Workflow metadata missing from an input image.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageMetadataError {
    #[error("The provided image does not have the required metadata: \"{0}\"")]
    MissingKey(String),

    #[error("Could not read image metadata from '{path}': {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// Unified error type for tweak rendering, patching and queue execution.
#[derive(Error, Debug)]
pub enum TweakError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    NodeField(#[from] NodeFieldError),

    #[error(transparent)]
    Template(#[from] TemplateRenderError),

    #[error(transparent)]
    Wildcard(#[from] WildcardError),

    #[error(transparent)]
    ImageMetadata(#[from] ImageMetadataError),

    #[error("Invalid {graph} graph: {message}")]
    GraphFormat { graph: GraphKind, message: String },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Job execution failed: {0}")]
    Execution(String),

    #[error("Job not found in queue or history: {0}")]
    JobNotFound(String),
}

impl TweakError {
    /// Wraps an I/O error with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TweakError>;
