//! Execution Timeline
//!
//! Records when each job repetition starts and ends, for timing reports and
//! an ASCII chart printed after a queue run.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Width of the chart bar area, in characters.
const CHART_WIDTH: f64 = 50.0;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Repetition sent to the executor
    Started,
    /// Executor returned an output
    Completed,
    /// Repetition failed
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Repetition label, e.g. `job-2 #3`
    pub label: String,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// Start/end record of every repetition run by a queue.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn add_event(&mut self, label: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            label: label.into(),
            event_type,
            timestamp: Instant::now(),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Time since the timeline was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Pairs each start with its end, as `(label, start ms, end ms)` offsets
    /// from the timeline start, ordered by start.
    fn spans(&self) -> Vec<(String, u128, u128)> {
        let mut starts: HashMap<&str, u128> = HashMap::new();
        let mut spans = Vec::new();

        for event in &self.events {
            let offset = event.timestamp.duration_since(self.start_time).as_millis();
            match event.event_type {
                EventType::Started => {
                    starts.insert(event.label.as_str(), offset);
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = starts.remove(event.label.as_str()) {
                        spans.push((event.label.clone(), start, offset));
                    }
                }
            }
        }

        spans.sort_by_key(|(_, start, _)| *start);
        spans
    }

    /// Duration of every finished repetition, in milliseconds.
    pub fn durations(&self) -> HashMap<String, u128> {
        self.spans()
            .into_iter()
            .map(|(label, start, end)| (label, end - start))
            .collect()
    }

    /// Mean duration of finished repetitions.
    pub fn average_duration(&self) -> Option<Duration> {
        let spans = self.spans();
        if spans.is_empty() {
            return None;
        }
        let total: u128 = spans.iter().map(|(_, start, end)| end - start).sum();
        let average = total / spans.len() as u128;
        Some(Duration::from_millis(u64::try_from(average).unwrap_or(u64::MAX)))
    }

    /// ASCII chart with one bar per finished repetition.
    pub fn chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.elapsed().as_millis();
        if total_time == 0 {
            return output;
        }
        let scale = CHART_WIDTH / total_time as f64;

        for (label, start, end) in self.spans() {
            let start_pos = (start as f64 * scale) as usize;
            let width = ((end - start) as f64 * scale).max(1.0) as usize;

            output.push_str(&format!(
                "{} |{}{}| ({} ms)\n",
                truncate(&label, 12),
                " ".repeat(start_pos),
                "#".repeat(width),
                end - start
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.events().is_empty());
        assert!(timeline.average_duration().is_none());
    }

    #[test]
    fn test_durations() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("job-1 #1", EventType::Started);
        thread::sleep(Duration::from_millis(30));
        timeline.add_event("job-1 #1", EventType::Completed);

        let durations = timeline.durations();
        assert!(durations["job-1 #1"] >= 30);
        assert!(timeline.average_duration().unwrap() >= Duration::from_millis(30));
    }

    #[test]
    fn test_unfinished_repetition_has_no_duration() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("job-1 #1", EventType::Started);
        assert!(timeline.durations().is_empty());
    }

    #[test]
    fn test_failed_event_closes_span() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("job-3 #1", EventType::Started);
        timeline.add_event("job-3 #1", EventType::Failed);

        assert_eq!(timeline.events()[1].event_type, EventType::Failed);
        assert!(timeline.durations().contains_key("job-3 #1"));
    }

    #[test]
    fn test_repeated_labels_pair_in_order() {
        let mut timeline = ExecutionTimeline::new();
        for _ in 0..2 {
            timeline.add_event("job-1", EventType::Started);
            timeline.add_event("job-1", EventType::Completed);
        }
        assert_eq!(timeline.spans().len(), 2);
    }

    #[test]
    fn test_chart() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("job-1 #1", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event("job-1 #1", EventType::Completed);
        timeline.add_event("job-1 #2", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event("job-1 #2", EventType::Completed);

        let chart = timeline.chart();
        assert!(chart.contains("job-1 #1"));
        assert!(chart.contains("job-1 #2"));
        assert!(chart.contains("Total:"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc  ");
        assert_eq!(truncate("a-very-long-label", 8), "a-ver...");
    }
}
