//! Execution Timeline
//!
//! Derives step timings from a recorded job execution for reports and
//! ASCII Gantt charts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::repository::{BatchStatus, JobExecution};

/// Width of the chart bars in characters.
const CHART_WIDTH: f64 = 50.0;

/// Timing of one step execution relative to the job start.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub step_execution_id: u64,
    pub step_name: String,
    pub status: BatchStatus,
    /// Offset of the step start from the job start, in milliseconds
    pub start_ms: i64,
    /// Offset of the step end, `None` while the step runs
    pub end_ms: Option<i64>,
}

impl TimelineEntry {
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_ms.map(|end| end - self.start_ms)
    }
}

/// Step-level timeline of one job execution.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    job_name: String,
    status: BatchStatus,
    entries: Vec<TimelineEntry>,
    total_ms: i64,
}

fn offset_ms(origin: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    (at - origin).num_milliseconds().max(0)
}

impl ExecutionTimeline {
    /// Builds the timeline of a job execution snapshot.
    ///
    /// Offsets are measured from the job's start time (or its create time
    /// if it never started). A running job is measured up to now.
    pub fn from_execution(execution: &JobExecution) -> Self {
        let origin = execution.start_time.unwrap_or(execution.create_time);

        let entries: Vec<TimelineEntry> = execution
            .step_executions
            .iter()
            .map(|step| TimelineEntry {
                step_execution_id: step.id,
                step_name: step.step_name.clone(),
                status: step.status,
                start_ms: offset_ms(origin, step.start_time),
                end_ms: step.end_time.map(|end| offset_ms(origin, end)),
            })
            .collect();

        let total_ms = offset_ms(origin, execution.end_time.unwrap_or_else(Utc::now));

        Self {
            job_name: execution.job_name().to_string(),
            status: execution.status,
            entries,
            total_ms,
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Total job time in milliseconds.
    pub fn total_ms(&self) -> i64 {
        self.total_ms
    }

    /// Returns finished step durations in milliseconds, keyed by step name.
    pub fn durations(&self) -> BTreeMap<String, i64> {
        self.entries
            .iter()
            .filter_map(|e| e.duration_ms().map(|d| (e.step_name.clone(), d)))
            .collect()
    }

    /// Generates an ASCII Gantt chart.
    ///
    /// Each step is shown as a bar indicating when it ran relative to the
    /// total job time. Running steps extend to the end of the chart.
    pub fn gantt_chart(&self) -> String {
        let mut output = format!("\nTimeline of '{}' [{}]:\n\n", self.job_name, self.status);

        if self.entries.is_empty() {
            output.push_str("(no steps ran)\n");
            return output;
        }

        let scale = if self.total_ms > 0 {
            CHART_WIDTH / self.total_ms as f64
        } else {
            0.0
        };

        for entry in &self.entries {
            let end = entry.end_ms.unwrap_or(self.total_ms);
            let start_pos = (entry.start_ms as f64 * scale) as usize;
            let width = (((end - entry.start_ms) as f64 * scale).max(1.0)) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            let timing = match entry.duration_ms() {
                Some(ms) => format!("{} ms", ms),
                None => "running".to_string(),
            };

            output.push_str(&format!(
                "{:12} |{:width$}| {} ({})\n",
                truncate(&entry.step_name, 12),
                bar,
                entry.status,
                timing,
                width = CHART_WIDTH as usize + 1
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", self.total_ms));
        output
    }
}

/// Pads or truncates a name to exactly `max_len` characters.
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
    use crate::job::JobParameters;
    use crate::repository::{JobInstance, StepExecution};
    use chrono::Duration;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn step(
        id: u64,
        name: &str,
        start: i64,
        end: Option<i64>,
        status: BatchStatus,
    ) -> StepExecution {
        StepExecution {
            id,
            job_execution_id: 1,
            step_name: name.to_string(),
            status,
            start_time: at(start),
            end_time: end.map(at),
            summary: None,
        }
    }

    fn execution(steps: Vec<StepExecution>, end: Option<i64>, status: BatchStatus) -> JobExecution {
        JobExecution {
            id: 1,
            job_instance: JobInstance {
                id: 1,
                job_name: "sampleJob".to_string(),
                parameters: JobParameters::new(),
            },
            status,
            create_time: at(0),
            start_time: Some(at(0)),
            end_time: end.map(at),
            step_executions: steps,
        }
    }

    #[test]
    fn test_entries_are_relative_to_job_start() {
        let exec = execution(
            vec![
                step(1, "taskletA", 10, Some(60), BatchStatus::Completed),
                step(2, "taskletB", 60, Some(100), BatchStatus::Completed),
            ],
            Some(100),
            BatchStatus::Completed,
        );

        let timeline = ExecutionTimeline::from_execution(&exec);
        assert_eq!(timeline.total_ms(), 100);
        assert_eq!(timeline.entries()[0].start_ms, 10);
        assert_eq!(timeline.entries()[0].duration_ms(), Some(50));
        assert_eq!(timeline.entries()[1].end_ms, Some(100));
    }

    #[test]
    fn test_durations_skip_running_steps() {
        let exec = execution(
            vec![
                step(1, "a", 0, Some(20), BatchStatus::Completed),
                step(2, "b", 20, None, BatchStatus::Started),
            ],
            None,
            BatchStatus::Started,
        );

        let durations = ExecutionTimeline::from_execution(&exec).durations();
        assert_eq!(durations.get("a"), Some(&20));
        assert!(!durations.contains_key("b"));
    }

    #[test]
    fn test_gantt_chart_generation() {
        let exec = execution(
            vec![
                step(1, "taskletA", 0, Some(50), BatchStatus::Completed),
                step(2, "taskletB", 50, Some(100), BatchStatus::Failed),
            ],
            Some(100),
            BatchStatus::Failed,
        );

        let chart = ExecutionTimeline::from_execution(&exec).gantt_chart();
        assert!(chart.contains("sampleJob"));
        assert!(chart.contains("taskletA"));
        assert!(chart.contains("FAILED (50 ms)"));
        assert!(chart.contains("Total: 100 ms"));
    }

    #[test]
    fn test_gantt_chart_empty() {
        let exec = execution(Vec::new(), Some(5), BatchStatus::Failed);
        let chart = ExecutionTimeline::from_execution(&exec).gantt_chart();
        assert!(chart.contains("Timeline"));
        assert!(chart.contains("no steps ran"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 8), "short   ");
        assert_eq!(truncate("a_very_long_step_name", 8), "a_ver...");
    }
}
