//! Job Launcher
//!
//! Starts job definitions on dedicated worker threads:
//! - The job execution record is created on the caller's thread, so an
//!   unavailable store fails the launch call itself
//! - Steps then run strictly in definition order on the worker
//! - A failing (or panicking) step is recorded and halts the remaining
//!   steps of that execution only

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::error::{LaunchError, RepositoryError};
use crate::job::{
    JobDefinition, JobParameters, NamedStep, RepeatStatus, Step, StepContext, StepFailure,
};
use crate::repository::{BatchStatus, JobExecution, JobRepository};

/// Handle to a launched job execution.
///
/// Dropping the handle detaches the worker; the execution still runs to
/// completion and its records stay queryable through the store.
#[derive(Debug)]
pub struct JobHandle {
    id: u64,
    job_name: String,
    worker: JoinHandle<BatchStatus>,
}

impl JobHandle {
    /// Id of the job execution record.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Whether the worker has finished all its steps.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Blocks until the worker is done and returns the final job status.
    pub fn wait(self) -> Result<BatchStatus, LaunchError> {
        self.worker
            .join()
            .map_err(|_| LaunchError::WorkerPanicked(self.id))
    }
}

/// Launches jobs asynchronously against an execution record store.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use batchrun::execution::JobLauncher;
/// use batchrun::job::{JobDefinition, JobParameters, LogParameterStep};
/// use batchrun::repository::{BatchStatus, InMemoryJobRepository};
///
/// let repository = Arc::new(InMemoryJobRepository::new());
/// let launcher = JobLauncher::new(repository);
///
/// let job = Arc::new(
///     JobDefinition::builder("sampleJob")
///         .step("taskletA", LogParameterStep::new("id"))
///         .build()
///         .unwrap(),
/// );
/// let params = JobParameters::builder().add_string("id", "testing 123").build();
///
/// let handle = launcher.launch(job, params).unwrap();
/// assert_eq!(handle.wait().unwrap(), BatchStatus::Completed);
/// ```
#[derive(Clone)]
pub struct JobLauncher {
    repository: Arc<dyn JobRepository>,
}

impl JobLauncher {
    pub fn new(repository: Arc<dyn JobRepository>) -> Self {
        Self { repository }
    }

    /// Records a new job execution and starts it on a worker thread.
    ///
    /// Returns as soon as the worker is running; use the handle (or a
    /// [`JobOperator`](super::JobOperator)) to follow progress.
    pub fn launch(
        &self,
        job: Arc<JobDefinition>,
        parameters: JobParameters,
    ) -> Result<JobHandle, LaunchError> {
        let execution = self
            .repository
            .create_job_execution(job.name(), &parameters)
            .map_err(|e| {
                error!("Could not create execution for job '{}': {}", job.name(), e);
                e
            })?;

        let id = execution.id;
        info!(
            "Job: [{}] launched as execution {} with parameters: {}",
            job.name(),
            id,
            parameters
        );

        let repository = Arc::clone(&self.repository);
        let worker_job = Arc::clone(&job);
        let spawned = thread::Builder::new()
            .name(format!("job-execution-{}", id))
            .spawn(move || run_job(repository.as_ref(), &worker_job, &execution));

        match spawned {
            Ok(worker) => Ok(JobHandle {
                id,
                job_name: job.name().to_string(),
                worker,
            }),
            Err(source) => {
                error!("Failed to start worker for execution {}: {}", id, source);
                if let Err(e) = self.repository.update_job_execution(id, BatchStatus::Failed) {
                    warn!("Could not mark execution {} failed: {}", id, e);
                }
                Err(LaunchError::Spawn { id, source })
            }
        }
    }
}

/// Runs every step of `job` for one execution and returns the final status.
fn run_job(
    repository: &dyn JobRepository,
    job: &JobDefinition,
    execution: &JobExecution,
) -> BatchStatus {
    if let Err(e) = repository.update_job_execution(execution.id, BatchStatus::Started) {
        error!("Could not start job execution {}: {}", execution.id, e);
        return finish_job(repository, execution.id, BatchStatus::Failed);
    }

    let mut status = BatchStatus::Completed;
    for named in job.steps() {
        match run_step(repository, execution, named) {
            Ok(BatchStatus::Completed) => {}
            Ok(_) => {
                status = BatchStatus::Failed;
                break;
            }
            Err(e) => {
                error!(
                    "Step '{}' of execution {} could not be recorded: {}",
                    named.name(),
                    execution.id,
                    e
                );
                status = BatchStatus::Failed;
                break;
            }
        }
    }

    finish_job(repository, execution.id, status)
}

/// Records the job's terminal status. A refused `COMPLETED` falls back to
/// `FAILED` so the execution never stays open.
fn finish_job(repository: &dyn JobRepository, id: u64, status: BatchStatus) -> BatchStatus {
    match repository.update_job_execution(id, status) {
        Ok(execution) => {
            let elapsed = execution
                .start_time
                .zip(execution.end_time)
                .map(|(start, end)| (end - start).num_milliseconds())
                .unwrap_or(0);
            info!(
                "Job: [{}] execution {} finished with status: [{}] in {}ms",
                execution.job_name(),
                id,
                execution.status,
                elapsed
            );
            execution.status
        }
        Err(e) if status == BatchStatus::Completed => {
            warn!("Execution {} could not complete ({}); marking it failed", id, e);
            finish_job(repository, id, BatchStatus::Failed)
        }
        Err(e) => {
            error!("Could not record final status of execution {}: {}", id, e);
            BatchStatus::Failed
        }
    }
}

/// Runs one step inside its own step execution record.
fn run_step(
    repository: &dyn JobRepository,
    execution: &JobExecution,
    named: &NamedStep,
) -> Result<BatchStatus, RepositoryError> {
    let step_execution = repository.create_step_execution(execution.id, named.name())?;
    let context = StepContext::new(
        execution.job_name(),
        execution.id,
        named.name(),
        step_execution.id,
        execution.parameters().clone(),
    );

    info!("Executing step: [{}]", named.name());

    let (status, summary) = match invoke(named.step(), &context) {
        Ok(summary) => (BatchStatus::Completed, summary),
        Err(failure) => {
            error!("Step '{}' failed: {}", named.name(), failure);
            (BatchStatus::Failed, Some(failure.reason))
        }
    };

    let recorded = repository.update_step_execution(&step_execution, status, summary)?;
    info!(
        "Step: [{}] finished with status: [{}] in {}ms",
        named.name(),
        recorded.status,
        recorded.duration().map_or(0, |d| d.num_milliseconds())
    );

    Ok(recorded.status)
}

/// Invokes a step until it reports `Finished`.
///
/// Panics are contained here and turned into step failures. Returns the
/// last summary the step produced.
fn invoke(step: &dyn Step, context: &StepContext) -> Result<Option<String>, StepFailure> {
    let mut summary = None;
    let mut invocations: u64 = 0;

    loop {
        invocations += 1;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| step.run(context)))
            .map_err(|payload| {
                StepFailure::new(format!("step panicked: {}", panic_message(payload.as_ref())))
            })??;

        if outcome.summary.is_some() {
            summary = outcome.summary;
        }

        match outcome.status {
            RepeatStatus::Finished => {
                debug!(
                    "Step '{}' finished after {} invocation(s)",
                    context.step_name(),
                    invocations
                );
                return Ok(summary);
            }
            RepeatStatus::Continuable => {
                debug!(
                    "Step '{}' asked to continue (invocation {})",
                    context.step_name(),
                    invocations
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
