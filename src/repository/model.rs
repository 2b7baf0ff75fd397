//! Execution Records
//!
//! Snapshots of job instances, job executions and step executions as kept
//! by the execution record store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobParameters;

/// Lifecycle status shared by job and step executions.
///
/// `Starting`/`Started` move to exactly one of the terminal states, which
/// are final. `Stopped` is reserved for cooperative cancellation and is
/// never entered by the launcher.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Starting,
    Started,
    Completed,
    Failed,
    Stopped,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    pub fn is_running(self) -> bool {
        !self.is_terminal()
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        match self {
            Self::Starting => next != Self::Starting,
            Self::Started => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job identified together with one parameter set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobInstance {
    pub id: u64,
    pub job_name: String,
    pub parameters: JobParameters,
}

/// One run of one step within a job execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepExecution {
    pub id: u64,
    /// Owning job execution
    pub job_execution_id: u64,
    pub step_name: String,
    pub status: BatchStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

impl StepExecution {
    /// Summary as reported by queries: the recorded text, or the status
    /// name when the step recorded none.
    pub fn summary_text(&self) -> String {
        self.summary
            .clone()
            .unwrap_or_else(|| self.status.to_string())
    }

    /// Wall time spent in the step, if it has ended.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// One attempt to run a job instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobExecution {
    pub id: u64,
    pub job_instance: JobInstance,
    pub status: BatchStatus,
    pub create_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Step executions in the order they were started
    pub step_executions: Vec<StepExecution>,
}

impl JobExecution {
    pub fn job_name(&self) -> &str {
        &self.job_instance.job_name
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.job_instance.parameters
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn step_execution(&self, step_execution_id: u64) -> Option<&StepExecution> {
        self.step_executions
            .iter()
            .find(|s| s.id == step_execution_id)
    }

    /// Whether every recorded step execution completed.
    pub fn all_steps_completed(&self) -> bool {
        self.step_executions
            .iter()
            .all(|s| s.status == BatchStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(status: BatchStatus, summary: Option<&str>) -> StepExecution {
        StepExecution {
            id: 1,
            job_execution_id: 1,
            step_name: "taskletA".to_string(),
            status,
            start_time: Utc::now(),
            end_time: None,
            summary: summary.map(str::to_string),
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!BatchStatus::Starting.is_terminal());
        assert!(!BatchStatus::Started.is_terminal());
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(BatchStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_transitions() {
        use BatchStatus::*;

        assert!(Starting.can_transition_to(Started));
        assert!(Starting.can_transition_to(Failed));
        assert!(Started.can_transition_to(Completed));
        assert!(Started.can_transition_to(Stopped));
        assert!(!Started.can_transition_to(Starting));
        assert!(!Started.can_transition_to(Started));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Stopped.can_transition_to(Started));
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&BatchStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        assert_eq!(BatchStatus::Started.to_string(), "STARTED");
    }

    #[test]
    fn test_summary_text_falls_back_to_status() {
        assert_eq!(step(BatchStatus::Started, None).summary_text(), "STARTED");
        assert_eq!(
            step(BatchStatus::Completed, Some("A-ok")).summary_text(),
            "A-ok"
        );
    }
}
