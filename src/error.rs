//! Error Types
//!
//! One error enum per layer. Step failures are not listed here: they are
//! recorded on the step execution (see [`crate::job::StepFailure`]) and
//! never escape the launcher's worker.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::repository::BatchStatus;

/// Invalid job, step or parameter configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Job has empty or whitespace-only name")]
    EmptyJobName,

    #[error("Job '{0}' has no steps")]
    EmptyJob(String),

    #[error("Job '{0}' has a step with an empty name")]
    EmptyStepName(String),

    #[error("Duplicate step name '{step}' in job '{job}'")]
    DuplicateStepName { job: String, step: String },

    #[error("Duplicate job name: '{0}'")]
    DuplicateJob(String),

    #[error("Unknown job: '{0}'")]
    UnknownJob(String),

    #[error("Invalid job parameter: {0}")]
    InvalidParameter(String),

    #[error("Step '{step}': {reason}")]
    InvalidStep { step: String, reason: String },

    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid job file: {0}")]
    Parse(String),
}

/// Failures of the execution record store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("No job execution with id {0}")]
    JobExecutionNotFound(u64),

    #[error("No step execution with id {0}")]
    StepExecutionNotFound(u64),

    #[error("Execution {id} is already terminal ({status})")]
    AlreadyTerminal { id: u64, status: BatchStatus },

    #[error("Execution {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: u64,
        from: BatchStatus,
        to: BatchStatus,
    },

    #[error("Execution record store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// True for errors caused by an id the store has never issued.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::JobExecutionNotFound(_) | Self::StepExecutionNotFound(_)
        )
    }
}

/// Failures of a launch call or of waiting on its worker.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Failed to start worker for job execution {id}: {source}")]
    Spawn {
        id: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker for job execution {0} panicked")]
    WorkerPanicked(u64),
}

/// Failures of read-only queries.
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("No job execution with id {0}")]
    NotFound(u64),

    #[error("Job execution {id} did not finish within {timeout:?}")]
    Timeout { id: u64, timeout: Duration },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for OperatorError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::JobExecutionNotFound(id) => Self::NotFound(id),
            other => Self::Repository(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_messages() {
        let err = ConfigurationError::DuplicateStepName {
            job: "sampleJob".to_string(),
            step: "taskletA".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate step name 'taskletA' in job 'sampleJob'"
        );
    }

    #[test]
    fn test_repository_not_found_maps_to_operator_not_found() {
        let err: OperatorError = RepositoryError::JobExecutionNotFound(7).into();
        assert!(matches!(err, OperatorError::NotFound(7)));

        let err: OperatorError = RepositoryError::Unavailable("disk".into()).into();
        assert!(matches!(err, OperatorError::Repository(_)));
    }

    #[test]
    fn test_is_not_found() {
        assert!(RepositoryError::JobExecutionNotFound(1).is_not_found());
        assert!(RepositoryError::StepExecutionNotFound(1).is_not_found());
        assert!(!RepositoryError::Unavailable("x".into()).is_not_found());
    }
}
