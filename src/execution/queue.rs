//! Job Queue
//!
//! Runs queued jobs strictly one after another:
//! - each repetition is patched, handed to the executor and timed
//! - a stop request or a pause flag file only takes effect between
//!   repetitions
//! - a failing job is marked failed, moved to history, and stops the queue

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use super::executor::JobExecutor;
use super::job::{Job, JobId, JobStatus};
use crate::error::{Result, TweakError};
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::tweaks::Tweaks;
use crate::workflow::Workflow;

/// Interval for checking the pause flag file.
const PAUSE_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Thread-safe stop/resume handle for a running queue.
#[derive(Debug, Clone, Default)]
pub struct QueueControl {
    stop_requested: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
}

impl QueueControl {
    /// Requests a stop after the current repetition.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Clears a stop request.
    pub fn resume(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// True while [`JobQueue::start`] is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

/// How a call to [`JobQueue::start`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Every queued job finished
    Completed,
    /// A stop was requested; unfinished jobs stay queued
    Stopped,
}

/// Sequential queue of tweak jobs.
#[derive(Debug, Default)]
pub struct JobQueue {
    queue: VecDeque<Job>,
    history: Vec<Job>,
    control: QueueControl,
    pause_flag_path: Option<PathBuf>,
    timeline: ExecutionTimeline,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path for pause/resume signaling.
    pub fn set_pause_flag_path(&mut self, path: impl Into<PathBuf>) {
        self.pause_flag_path = Some(path.into());
    }

    /// Handle that can stop the queue from another thread.
    pub fn control(&self) -> QueueControl {
        self.control.clone()
    }

    /// Queues a job, optionally checking that the tweaks apply first.
    pub fn add(
        &mut self,
        workflow: Workflow,
        tweaks: Tweaks,
        amount: u32,
        validate: bool,
    ) -> Result<JobId> {
        if validate {
            workflow.validate(&tweaks)?;
        }
        let job = Job::new(workflow, tweaks, amount);
        let id = job.id();
        info!(
            "Queued {} ('{}' with '{}', {} run(s))",
            id,
            job.workflow().name(),
            job.tweaks().name(),
            amount
        );
        self.queue.push_back(job);
        Ok(id)
    }

    /// Removes a job from the queue, or from history if already finished.
    pub fn remove(&mut self, id: JobId) -> Result<Job> {
        if let Some(index) = self.queue.iter().position(|job| job.id() == id) {
            if let Some(job) = self.queue.remove(index) {
                return Ok(job);
            }
        }
        if let Some(index) = self.history.iter().position(|job| job.id() == id) {
            return Ok(self.history.remove(index));
        }
        Err(TweakError::JobNotFound(id.to_string()))
    }

    /// Empties both the queue and the history.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.history.clear();
    }

    /// Number of jobs still queued.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn queued(&self) -> impl Iterator<Item = &Job> {
        self.queue.iter()
    }

    pub fn history(&self) -> &[Job] {
        &self.history
    }

    /// Queued jobs followed by finished ones.
    pub fn all_jobs(&self) -> Vec<&Job> {
        self.queue.iter().chain(self.history.iter()).collect()
    }

    /// 1-based position of a queued job.
    pub fn position_of(&self, id: JobId) -> Option<usize> {
        self.queue.iter().position(|job| job.id() == id).map(|i| i + 1)
    }

    pub fn timeline(&self) -> &ExecutionTimeline {
        &self.timeline
    }

    /// Runs queued jobs until the queue is empty, a stop is requested or a
    /// job fails.
    pub fn start(&mut self, executor: &mut dyn JobExecutor) -> Result<QueueOutcome> {
        info!("Starting queue ({} job(s))", self.queue.len());
        self.control.resume();
        self.control.set_active(true);

        let outcome = self.run_jobs(executor);

        self.control.set_active(false);
        match &outcome {
            Ok(QueueOutcome::Completed) => info!("Queue completed."),
            Ok(QueueOutcome::Stopped) => info!("Queue stopped with {} job(s) left", self.queue.len()),
            Err(e) => error!("Queue stopped after failure: {}", e),
        }
        outcome
    }

    fn run_jobs(&mut self, executor: &mut dyn JobExecutor) -> Result<QueueOutcome> {
        while let Some(job) = self.queue.front_mut() {
            info!("Starting {} ({}/{} done)", job.id(), job.progress(), job.amount());

            while job.remaining() > 0 {
                if let Some(ref pause_path) = self.pause_flag_path {
                    check_pause_flag(pause_path);
                }
                if self.control.is_stopped() {
                    job.set_pending();
                    return Ok(QueueOutcome::Stopped);
                }

                let label = job.repetition_label();
                self.timeline.add_event(label.clone(), EventType::Started);
                let started = Instant::now();

                let result = job
                    .prepare_repetition()
                    .and_then(|workflow| executor.execute(workflow));

                match result {
                    Ok(output) => {
                        job.record_output(output);
                        self.timeline.add_event(label, EventType::Completed);
                        info!(
                            "Finished {} ({}/{}) in {:.2?}",
                            job.id(),
                            job.progress(),
                            job.amount(),
                            started.elapsed()
                        );
                    }
                    Err(e) => {
                        self.timeline.add_event(label, EventType::Failed);
                        error!("{} failed: {}", job.id(), e);
                        job.finish(JobStatus::Failed);
                        if let Some(failed) = self.queue.pop_front() {
                            self.history.push(failed);
                        }
                        self.control.stop();
                        return Err(e);
                    }
                }
            }

            job.finish(JobStatus::Completed);
            if let Some(done) = self.queue.pop_front() {
                info!("{} completed", done.id());
                self.history.push(done);
            }
        }

        Ok(QueueOutcome::Completed)
    }
}

/// Blocks while the pause flag file exists.
fn check_pause_flag(pause_path: &Path) {
    if pause_path.exists() {
        warn!("Execution paused - waiting for resume signal");

        while pause_path.exists() {
            thread::sleep(PAUSE_CHECK_INTERVAL);
        }

        info!("Resumed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Settings;
    use crate::execution::executor::ExecutionOutput;
    use crate::template::TweakRenderer;
    use crate::tweaks::{Selector, Tweak};
    use serde_json::{json, Map, Value};
    use std::fs;
    use tempfile::tempdir;

    /// Records the seed of every workflow it receives.
    #[derive(Default)]
    struct RecordingExecutor {
        seeds: Vec<Value>,
        fail_on: Option<usize>,
        stop_after: Option<(usize, QueueControl)>,
    }

    impl JobExecutor for RecordingExecutor {
        fn execute(&mut self, workflow: &Workflow) -> Result<ExecutionOutput> {
            if self.fail_on == Some(self.seeds.len()) {
                return Err(TweakError::Execution("server unavailable".to_string()));
            }
            let seed = workflow.execution().node("1").unwrap()["inputs"]["seed"].clone();
            self.seeds.push(seed);
            if let Some((count, control)) = &self.stop_after {
                if self.seeds.len() == *count {
                    control.stop();
                }
            }
            Ok(ExecutionOutput::new(format!("out/{}.png", self.seeds.len())))
        }
    }

    fn workflow() -> Workflow {
        Workflow::from_documents(
            "queue test",
            json!({"nodes": [{"id": 1, "widgets_values": [0]}]}),
            json!({"1": {"inputs": {"seed": 0}}}),
        )
        .unwrap()
    }

    fn iteration_tweaks() -> Tweaks {
        let template = "tweaks:\n- selector:\n    id: 1\n  changes:\n    seed: {{ iteration * 10 }}\n";
        Tweaks::from_template(Arc::new(TweakRenderer::new(Settings::default())), template, "iter")
            .unwrap()
    }

    fn bad_tweaks() -> Tweaks {
        let mut changes = Map::new();
        changes.insert("missing".to_string(), json!(1));
        Tweaks::empty("bad").with_tweak(Tweak::new(Selector::id("1"), changes))
    }

    #[test]
    fn test_runs_all_repetitions() {
        let mut queue = JobQueue::new();
        let id = queue.add(workflow(), iteration_tweaks(), 3, true).unwrap();

        let mut executor = RecordingExecutor::default();
        let outcome = queue.start(&mut executor).unwrap();

        assert_eq!(outcome, QueueOutcome::Completed);
        assert_eq!(executor.seeds, vec![json!(0), json!(10), json!(20)]);
        assert_eq!(queue.remaining(), 0);

        let job = &queue.history()[0];
        assert_eq!(job.id(), id);
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.progress(), 3);
        assert_eq!(job.output_location(), Some(Path::new("out/3.png")));
        assert_eq!(queue.timeline().durations().len(), 3);
        assert!(!queue.control().is_active());
    }

    #[test]
    fn test_validation_on_add() {
        let mut queue = JobQueue::new();
        assert!(queue.add(workflow(), bad_tweaks(), 1, true).is_err());
        assert_eq!(queue.remaining(), 0);

        // Skipping validation queues the job anyway
        assert!(queue.add(workflow(), bad_tweaks(), 1, false).is_ok());
        assert_eq!(queue.remaining(), 1);
    }

    #[test]
    fn test_failure_moves_job_to_history_and_stops() {
        let mut queue = JobQueue::new();
        queue.add(workflow(), bad_tweaks(), 2, false).unwrap();
        queue.add(workflow(), iteration_tweaks(), 1, true).unwrap();

        let mut executor = RecordingExecutor::default();
        let result = queue.start(&mut executor);

        assert!(result.is_err());
        assert_eq!(queue.history().len(), 1);
        assert_eq!(queue.history()[0].status(), JobStatus::Failed);
        assert_eq!(queue.remaining(), 1);
        assert!(queue.control().is_stopped());
        assert!(executor.seeds.is_empty());
    }

    #[test]
    fn test_executor_error_fails_job() {
        let mut queue = JobQueue::new();
        queue.add(workflow(), iteration_tweaks(), 3, true).unwrap();

        let mut executor = RecordingExecutor {
            fail_on: Some(1),
            ..Default::default()
        };
        let result = queue.start(&mut executor);

        assert!(matches!(result, Err(TweakError::Execution(_))));
        let job = &queue.history()[0];
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.progress(), 1);
        assert!(job.finished_at().is_some());
    }

    #[test]
    fn test_stop_and_resume() {
        let mut queue = JobQueue::new();
        queue.add(workflow(), iteration_tweaks(), 4, true).unwrap();

        let mut executor = RecordingExecutor {
            stop_after: Some((2, queue.control())),
            ..Default::default()
        };
        let outcome = queue.start(&mut executor).unwrap();

        assert_eq!(outcome, QueueOutcome::Stopped);
        let job = queue.queued().next().unwrap();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.progress(), 2);

        executor.stop_after = None;
        let outcome = queue.start(&mut executor).unwrap();
        assert_eq!(outcome, QueueOutcome::Completed);
        assert_eq!(executor.seeds, vec![json!(0), json!(10), json!(20), json!(30)]);
    }

    #[test]
    fn test_remove_and_positions() {
        let mut queue = JobQueue::new();
        let first = queue.add(workflow(), Tweaks::default(), 1, true).unwrap();
        let second = queue.add(workflow(), Tweaks::default(), 1, true).unwrap();

        assert_eq!(queue.position_of(second), Some(2));
        queue.remove(first).unwrap();
        assert_eq!(queue.position_of(second), Some(1));
        assert_eq!(queue.position_of(first), None);
        assert!(matches!(queue.remove(first), Err(TweakError::JobNotFound(_))));
    }

    #[test]
    fn test_remove_from_history_and_clear() {
        let mut queue = JobQueue::new();
        let id = queue.add(workflow(), Tweaks::default(), 1, true).unwrap();
        queue.add(workflow(), Tweaks::default(), 1, true).unwrap();
        queue.start(&mut RecordingExecutor::default()).unwrap();

        assert_eq!(queue.all_jobs().len(), 2);
        queue.remove(id).unwrap();
        assert_eq!(queue.history().len(), 1);

        queue.clear();
        assert!(queue.all_jobs().is_empty());
    }

    #[test]
    fn test_pause_flag_absent_does_not_block() {
        let temp_dir = tempdir().unwrap();
        let pause_path = temp_dir.path().join("pause.flag");

        fs::write(&pause_path, "paused").unwrap();
        fs::remove_file(&pause_path).unwrap();

        let mut queue = JobQueue::new();
        queue.set_pause_flag_path(&pause_path);
        queue.add(workflow(), Tweaks::default(), 2, true).unwrap();
        assert_eq!(
            queue.start(&mut RecordingExecutor::default()).unwrap(),
            QueueOutcome::Completed
        );
    }

    #[test]
    fn test_pause_flag_waits_for_removal() {
        let temp_dir = tempdir().unwrap();
        let pause_path = temp_dir.path().join("pause.flag");
        fs::write(&pause_path, "paused").unwrap();

        let remover_path = pause_path.clone();
        let remover = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            fs::remove_file(remover_path).unwrap();
        });

        let started = Instant::now();
        check_pause_flag(&pause_path);
        remover.join().unwrap();

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(!pause_path.exists());
    }
}
