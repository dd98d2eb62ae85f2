//! Job Executors
//!
//! The queue hands every fully patched workflow to a [`JobExecutor`]. The
//! image generation server is one such executor; this module provides two
//! local ones:
//! - [`FileExecutor`] writes each resolved workflow to numbered JSON files
//! - [`DryRunExecutor`] only logs what would be sent

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{Result, TweakError};
use crate::workflow::Workflow;

/// Result of running one repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    /// Where the output was written
    pub output_path: PathBuf,
    /// Optional preview image bytes
    pub preview: Option<Vec<u8>>,
}

impl ExecutionOutput {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            preview: None,
        }
    }

    pub fn with_preview(output_path: impl Into<PathBuf>, preview: Vec<u8>) -> Self {
        Self {
            output_path: output_path.into(),
            preview: Some(preview),
        }
    }
}

/// Runs a resolved workflow.
pub trait JobExecutor {
    fn execute(&mut self, workflow: &Workflow) -> Result<ExecutionOutput>;
}

/// Writes `<name>_<NNNNN>_api.json` and `<name>_<NNNNN>.json` per repetition.
#[derive(Debug, Clone)]
pub struct FileExecutor {
    output_dir: PathBuf,
    counter: u32,
}

impl FileExecutor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            counter: 0,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of workflows written so far.
    pub fn written(&self) -> u32 {
        self.counter
    }

    /// First free counter value, so reruns do not overwrite earlier files.
    fn next_counter(&self, stem: &str) -> u32 {
        let mut counter = self.counter + 1;
        while self
            .output_dir
            .join(format!("{}_{:05}_api.json", stem, counter))
            .exists()
        {
            counter += 1;
        }
        counter
    }
}

/// Keeps a file-name-safe version of `name`.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "workflow".to_string()
    } else {
        cleaned
    }
}

impl JobExecutor for FileExecutor {
    fn execute(&mut self, workflow: &Workflow) -> Result<ExecutionOutput> {
        fs::create_dir_all(&self.output_dir).map_err(|e| TweakError::io(&self.output_dir, e))?;

        let stem = sanitize(workflow.name());
        let counter = self.next_counter(&stem);
        let execution_path = self.output_dir.join(format!("{}_{:05}_api.json", stem, counter));
        let presentation_path = self.output_dir.join(format!("{}_{:05}.json", stem, counter));

        workflow.save(&presentation_path, Some(execution_path.as_path()))?;
        self.counter = counter;

        info!("Wrote {}", execution_path.display());
        Ok(ExecutionOutput::new(execution_path))
    }
}

/// Logs the resolved execution graph without writing anything.
#[derive(Debug, Default, Clone)]
pub struct DryRunExecutor {
    runs: u32,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }
}

impl JobExecutor for DryRunExecutor {
    fn execute(&mut self, workflow: &Workflow) -> Result<ExecutionOutput> {
        self.runs += 1;
        let graph = serde_json::to_string_pretty(workflow.execution())?;
        info!("[DRY RUN] {} #{} ({} nodes)", workflow.name(), self.runs, workflow.len());
        debug!("{}", graph);
        Ok(ExecutionOutput::new(format!("dry-run/{}", self.runs)))
    }
}
