//! Runtime Settings
//!
//! Directories and server address consumed by template functions and the
//! job queue. Settings are stored as JSON and can be overridden through
//! environment variables.
//!
//! # Settings File Resolution
//!
//! The default settings file is resolved in the following order:
//! 1. Production path: `tweakrunner.json` next to the executable
//! 2. Current working directory: `tweakrunner.json`

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TweakError};

/// File name of the settings file.
pub const SETTINGS_FILE_NAME: &str = "tweakrunner.json";

/// Default address of the image generation server.
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8188";

/// Environment variables that override settings, by field.
pub const ENV_MODELS_FOLDER: &str = "MODELS_FOLDER";
pub const ENV_WILDCARDS_DIRECTORY: &str = "WILDCARDS_DIRECTORY";
pub const ENV_INPUT_FOLDER: &str = "COMFYUI_INPUT_FOLDER";
pub const ENV_OUTPUT_FOLDER: &str = "COMFYUI_OUTPUT_FOLDER";
pub const ENV_SERVER_ADDRESS: &str = "COMFYUI_SERVER_ADDRESS";

/// Lazily-initialized path to the default settings file.
pub static SETTINGS_PATH: Lazy<PathBuf> = Lazy::new(|| {
    // Priority 1: next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let prod_path = exe_dir.join(SETTINGS_FILE_NAME);
            if prod_path.exists() {
                info!("Using settings file: {}", prod_path.display());
                return prod_path;
            }
        }
    }

    // Priority 2: current working directory
    let cwd_path = PathBuf::from(SETTINGS_FILE_NAME);
    info!("Using CWD settings file: {}", cwd_path.display());
    cwd_path
});

/// User-configurable settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Address (`host:port`) of the image generation server
    #[serde(default = "default_server_address")]
    pub server_address: String,

    /// Root of the models tree used by `in_models_folder`/`from_models_folder`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_folder: Option<PathBuf>,

    /// Root of the `__file__` wildcard vocabulary files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcards_directory: Option<PathBuf>,

    /// Directory `as_image` copies images into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_folder: Option<PathBuf>,

    /// Directory generated outputs are written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_folder: Option<PathBuf>,
}

fn default_server_address() -> String {
    DEFAULT_SERVER_ADDRESS.to_string()
}

impl Settings {
    /// Creates settings with no directories configured.
    pub fn new() -> Self {
        Self {
            server_address: default_server_address(),
            models_folder: None,
            wildcards_directory: None,
            input_folder: None,
            output_folder: None,
        }
    }

    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| TweakError::io(path, e))?;
        let settings = serde_json::from_str(&content)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Loads settings, writing a default file first if none exists.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No settings at {}, writing defaults", path.display());
            Self::new().save(path)?;
        }
        Self::load(path)
    }

    /// Loads the settings file at [`SETTINGS_PATH`].
    pub fn load_default() -> Result<Self> {
        Self::load_or_default(&*SETTINGS_PATH)
    }

    /// Saves settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TweakError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| TweakError::io(path, e))?;
        info!("Settings saved to: {}", path.display());
        Ok(())
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(ENV_MODELS_FOLDER) {
            self.models_folder = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_WILDCARDS_DIRECTORY) {
            self.wildcards_directory = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_INPUT_FOLDER) {
            self.input_folder = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_OUTPUT_FOLDER) {
            self.output_folder = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_SERVER_ADDRESS) {
            self.server_address = value;
        }
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
