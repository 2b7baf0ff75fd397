//! Execution Record Store
//!
//! The store is the single writer of job instances, job executions and
//! step executions. Everything else receives cloned snapshots.
//!
//! # Components
//!
//! - [`model`]: Record types and the shared status lifecycle
//! - [`memory`]: In-memory store with per-execution locking
//! - [`archive`]: Optional durable backing for the in-memory store

pub mod archive;
pub mod memory;
pub mod model;

use std::collections::BTreeMap;

pub use archive::{ArchiveContents, ExecutionArchive, JsonDirArchive, ReservedIds};
pub use memory::InMemoryJobRepository;
pub use model::{BatchStatus, JobExecution, JobInstance, StepExecution};

use crate::error::RepositoryError;
use crate::job::JobParameters;

/// Contract of the execution record store.
///
/// Writes to one job execution are serialized; reads return snapshots that
/// never show a record mid-update.
pub trait JobRepository: Send + Sync {
    /// Creates (or reuses) the job instance for `(job_name, parameters)` and
    /// a new `STARTING` job execution with a fresh id.
    fn create_job_execution(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<JobExecution, RepositoryError>;

    /// Moves a job execution to `STARTED` or to a terminal status.
    ///
    /// The end time is set when a terminal status is reached. `COMPLETED`
    /// is refused unless every step execution completed.
    fn update_job_execution(
        &self,
        job_execution_id: u64,
        status: BatchStatus,
    ) -> Result<JobExecution, RepositoryError>;

    /// Appends a `STARTED` step execution to a running job execution.
    fn create_step_execution(
        &self,
        job_execution_id: u64,
        step_name: &str,
    ) -> Result<StepExecution, RepositoryError>;

    /// Records the terminal status and summary of a step execution.
    fn update_step_execution(
        &self,
        step_execution: &StepExecution,
        status: BatchStatus,
        summary: Option<String>,
    ) -> Result<StepExecution, RepositoryError>;

    fn job_execution(&self, job_execution_id: u64) -> Result<JobExecution, RepositoryError>;

    /// All executions of a job, oldest first.
    fn job_executions(&self, job_name: &str) -> Result<Vec<JobExecution>, RepositoryError>;

    /// All instances of a job, oldest first.
    fn job_instances(&self, job_name: &str) -> Result<Vec<JobInstance>, RepositoryError>;

    /// Step execution id → summary text for one job execution.
    fn step_execution_summaries(
        &self,
        job_execution_id: u64,
    ) -> Result<BTreeMap<u64, String>, RepositoryError> {
        let execution = self.job_execution(job_execution_id)?;
        Ok(execution
            .step_executions
            .iter()
            .map(|step| (step.id, step.summary_text()))
            .collect())
    }
}
