//! Environment Configuration Module
//!
//! Directories, server address and settings-file handling shared by the
//! template functions and the job queue.

pub mod settings;

pub use settings::{Settings, SETTINGS_PATH};
