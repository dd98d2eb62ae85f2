//! Workflow Loading and Saving
//!
//! Workflows come either from the text metadata of a generated PNG (keys
//! `workflow` and `prompt`) or from two JSON files.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use log::{debug, info};
use serde_json::Value;

use super::model::Workflow;
use crate::error::{ImageMetadataError, Result, TweakError};

/// PNG text key holding the presentation graph.
pub const PRESENTATION_KEY: &str = "workflow";

/// PNG text key holding the execution graph.
pub const EXECUTION_KEY: &str = "prompt";

/// Reads every text chunk (`tEXt`, `zTXt`, `iTXt`) of a PNG file.
pub fn read_png_text(path: &Path) -> std::result::Result<HashMap<String, String>, ImageMetadataError> {
    let unreadable = |message: String| ImageMetadataError::Unreadable {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
    let reader = png::Decoder::new(BufReader::new(file))
        .read_info()
        .map_err(|e| unreadable(e.to_string()))?;
    let info = reader.info();

    let mut text = HashMap::new();
    for chunk in &info.uncompressed_latin1_text {
        text.insert(chunk.keyword.clone(), chunk.text.clone());
    }
    for chunk in &info.compressed_latin1_text {
        let value = chunk.get_text().map_err(|e| unreadable(e.to_string()))?;
        text.insert(chunk.keyword.clone(), value);
    }
    for chunk in &info.utf8_text {
        let value = chunk.get_text().map_err(|e| unreadable(e.to_string()))?;
        text.insert(chunk.keyword.clone(), value);
    }

    debug!("Found {} text chunk(s) in {}", text.len(), path.display());
    Ok(text)
}

fn parse_document(text: &str, source: &Path) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| {
        debug!("Invalid JSON in {}", source.display());
        TweakError::Json(e)
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow".to_string())
}

/// Loads a workflow embedded in a PNG generated by the image server.
pub fn load_workflow_from_image(path: impl AsRef<Path>) -> Result<Workflow> {
    let path = path.as_ref();
    info!("Loading workflow from image: {}", path.display());

    let mut text = read_png_text(path)?;
    let presentation = text
        .remove(PRESENTATION_KEY)
        .ok_or_else(|| ImageMetadataError::MissingKey(PRESENTATION_KEY.to_string()))?;
    let execution = text
        .remove(EXECUTION_KEY)
        .ok_or_else(|| ImageMetadataError::MissingKey(EXECUTION_KEY.to_string()))?;

    Workflow::from_documents(
        file_stem(path),
        parse_document(&presentation, path)?,
        parse_document(&execution, path)?,
    )
}

/// Loads a workflow from a presentation JSON file and an execution JSON file.
pub fn load_workflow(
    presentation_path: impl AsRef<Path>,
    execution_path: impl AsRef<Path>,
) -> Result<Workflow> {
    let presentation_path = presentation_path.as_ref();
    let execution_path = execution_path.as_ref();
    info!(
        "Loading workflow from: {} + {}",
        presentation_path.display(),
        execution_path.display()
    );

    let read = |path: &Path| -> Result<Value> {
        let content = fs::read_to_string(path).map_err(|e| TweakError::io(path, e))?;
        debug!("JSON content loaded ({} bytes)", content.len());
        parse_document(&content, path)
    };

    Workflow::from_documents(
        file_stem(presentation_path),
        read(presentation_path)?,
        read(execution_path)?,
    )
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| TweakError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| TweakError::io(path, e))
}

/// Saves the presentation graph, and optionally the execution graph.
pub fn save_workflow(
    workflow: &Workflow,
    presentation_path: impl AsRef<Path>,
    execution_path: Option<&Path>,
) -> Result<()> {
    let presentation_path = presentation_path.as_ref();
    write_json(presentation_path, workflow.presentation().as_value())?;
    info!("Workflow saved to: {}", presentation_path.display());

    if let Some(execution_path) = execution_path {
        write_json(execution_path, &workflow.execution().clone().into_value())?;
        info!("Execution graph saved to: {}", execution_path.display());
    }
    Ok(())
}

impl Workflow {
    /// See [`load_workflow_from_image`].
    pub fn from_image(path: impl AsRef<Path>) -> Result<Self> {
        load_workflow_from_image(path)
    }

    /// See [`load_workflow`].
    pub fn from_files(
        presentation_path: impl AsRef<Path>,
        execution_path: impl AsRef<Path>,
    ) -> Result<Self> {
        load_workflow(presentation_path, execution_path)
    }

    /// See [`save_workflow`].
    pub fn save(&self, presentation_path: impl AsRef<Path>, execution_path: Option<&Path>) -> Result<()> {
        save_workflow(self, presentation_path, execution_path)
    }
}
