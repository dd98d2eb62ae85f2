//! Jobs
//!
//! A job runs one workflow `amount` times. Every repetition patches the
//! untouched snapshot of the workflow with the current tweaks, then
//! regenerates the tweaks for the next repetition.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::executor::ExecutionOutput;
use crate::error::Result;
use crate::tweaks::Tweaks;
use crate::workflow::Workflow;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", text)
    }
}

/// A workflow, its tweaks and how many times to run them.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    workflow: Workflow,
    original_workflow: Workflow,
    tweaks: Tweaks,
    status: JobStatus,
    amount: u32,
    progress: u32,
    output_location: Option<PathBuf>,
    preview: Option<Vec<u8>>,
    created_at: DateTime<Local>,
    finished_at: Option<DateTime<Local>>,
}

impl Job {
    pub fn new(workflow: Workflow, tweaks: Tweaks, amount: u32) -> Self {
        Self {
            id: JobId::next(),
            original_workflow: workflow.clone(),
            workflow,
            tweaks,
            status: JobStatus::Pending,
            amount,
            progress: 0,
            output_location: None,
            preview: None,
            created_at: Local::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Workflow of the latest repetition (the original before the first).
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// The workflow as it was added, never patched.
    pub fn original_workflow(&self) -> &Workflow {
        &self.original_workflow
    }

    /// Tweaks the next repetition will apply.
    pub fn tweaks(&self) -> &Tweaks {
        &self.tweaks
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    /// Repetitions still to run.
    pub fn remaining(&self) -> u32 {
        self.amount.saturating_sub(self.progress)
    }

    pub fn output_location(&self) -> Option<&Path> {
        self.output_location.as_deref()
    }

    pub fn preview(&self) -> Option<&[u8]> {
        self.preview.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    /// Label of the upcoming repetition, e.g. `job-4 #2`.
    pub fn repetition_label(&self) -> String {
        format!("{} #{}", self.id, self.progress + 1)
    }

    /// Marks the job in progress and patches the snapshot with the current
    /// tweaks, then regenerates the tweaks for the following repetition.
    pub(crate) fn prepare_repetition(&mut self) -> Result<&Workflow> {
        self.status = JobStatus::InProgress;
        self.workflow = self.original_workflow.apply_tweaks(&self.tweaks)?;
        self.tweaks = self.tweaks.regenerate()?;
        Ok(&self.workflow)
    }

    /// Records the output of a finished repetition.
    pub(crate) fn record_output(&mut self, output: ExecutionOutput) {
        self.progress += 1;
        self.output_location = Some(output.output_path);
        if output.preview.is_some() {
            self.preview = output.preview;
        }
    }

    pub(crate) fn set_pending(&mut self) {
        self.status = JobStatus::Pending;
    }

    pub(crate) fn finish(&mut self, status: JobStatus) {
        if status == JobStatus::Completed {
            self.progress = self.amount;
        }
        self.status = status;
        self.finished_at = Some(Local::now());
    }
}
