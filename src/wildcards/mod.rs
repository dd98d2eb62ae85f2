//! Wildcard Expansion
//!
//! Stable-diffusion style prompt wildcards:
//! - `{a|b|c}` picks one alternative uniformly
//! - `{a::5|b::4|c}` weights alternatives (`c` defaults to weight 1)
//! - `{a|{b|c}}` nests choices; inner choices resolve first
//! - `{a|b@color} ... {@color}` captures a choice and repeats it later
//! - `__etsy/colors__` draws a line from `<wildcards dir>/etsy/colors.txt`
//!
//! # Structure
//!
//! - [`parser`]: recursive-descent parser for the brace grammar
//! - [`processor`]: resolves parsed text against a random source

pub mod parser;
pub mod processor;

use std::path::PathBuf;

use thiserror::Error;

pub use parser::{parse, Alternative, Choice, Segment};
pub use processor::WildcardProcessor;

/// Errors raised while parsing or resolving wildcards.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WildcardError {
    #[error("Invalid wildcard format: {0}")]
    InvalidFormat(String),

    #[error("Unclosed '{{' opened at position {0}")]
    Unclosed(usize),

    #[error("Choice at position {0} has no alternatives")]
    EmptyChoice(usize),

    #[error("Wildcard directory not set")]
    MissingDirectory,

    #[error("Wildcard file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No lines found in file: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("Failed to read wildcard file '{}': {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Duplicate ref key found: {0}")]
    DuplicateReference(String),

    #[error("Reference to undefined key: {0}")]
    UndefinedReference(String),

    #[error("Reference '{0}' refers back to itself")]
    CyclicReference(String),
}
