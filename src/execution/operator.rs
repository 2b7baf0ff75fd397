//! Job Operator
//!
//! Read-only queries over the execution record store. Nothing here
//! mutates state; unknown execution ids surface as
//! [`OperatorError::NotFound`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::OperatorError;
use crate::job::{JobParameters, JobRegistry};
use crate::repository::{JobExecution, JobRepository};

/// Interval between store reads while waiting for an execution.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Query surface over recorded executions.
#[derive(Clone)]
pub struct JobOperator {
    repository: Arc<dyn JobRepository>,
    registry: Arc<JobRegistry>,
}

impl JobOperator {
    pub fn new(repository: Arc<dyn JobRepository>, registry: Arc<JobRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Step execution id → summary text of one job execution.
    pub fn summaries(&self, job_execution_id: u64) -> Result<BTreeMap<u64, String>, OperatorError> {
        self.repository
            .step_execution_summaries(job_execution_id)
            .map_err(|e| {
                if e.is_not_found() {
                    debug!("Summaries requested for unknown execution {}", job_execution_id);
                }
                OperatorError::from(e)
            })
    }

    /// Snapshot of one job execution.
    pub fn execution(&self, job_execution_id: u64) -> Result<JobExecution, OperatorError> {
        Ok(self.repository.job_execution(job_execution_id)?)
    }

    /// Parameters a job execution was launched with.
    pub fn parameters(&self, job_execution_id: u64) -> Result<JobParameters, OperatorError> {
        Ok(self.execution(job_execution_id)?.parameters().clone())
    }

    /// Ids of executions of `job_name` that have not reached a terminal status.
    pub fn running_executions(&self, job_name: &str) -> Result<Vec<u64>, OperatorError> {
        Ok(self
            .repository
            .job_executions(job_name)?
            .into_iter()
            .filter(JobExecution::is_running)
            .map(|e| e.id)
            .collect())
    }

    /// Names of all registered jobs.
    pub fn job_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Polls until the execution reaches a terminal status.
    pub fn wait_for(
        &self,
        job_execution_id: u64,
        timeout: Duration,
    ) -> Result<JobExecution, OperatorError> {
        let deadline = Instant::now() + timeout;

        loop {
            let execution = self.execution(job_execution_id)?;
            if !execution.is_running() {
                return Ok(execution);
            }

            if Instant::now() >= deadline {
                return Err(OperatorError::Timeout {
                    id: job_execution_id,
                    timeout,
                });
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::JobLauncher;
    use crate::job::{JobDefinition, StepContext, StepFailure, StepOutcome};
    use crate::repository::{BatchStatus, InMemoryJobRepository};
    use std::sync::mpsc::channel;
    use std::sync::Mutex;

    fn ok(
        summary: &'static str,
    ) -> impl Fn(&StepContext) -> Result<StepOutcome, StepFailure> + Send + Sync {
        move |_: &StepContext| Ok(StepOutcome::finished().with_summary(summary))
    }

    fn setup(job: JobDefinition) -> (JobLauncher, JobOperator, Arc<JobDefinition>) {
        let repository: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let mut registry = JobRegistry::new();
        let job = registry.register(job).unwrap();

        let launcher = JobLauncher::new(Arc::clone(&repository));
        let operator = JobOperator::new(repository, Arc::new(registry));
        (launcher, operator, job)
    }

    fn params() -> JobParameters {
        JobParameters::builder().add_string("id", "testing 123").build()
    }

    #[test]
    fn test_summaries_after_completion() {
        let job = JobDefinition::builder("sampleJob")
            .step("stepA", ok("A-ok"))
            .step("stepB", ok("B-ok"))
            .build()
            .unwrap();
        let (launcher, operator, job) = setup(job);

        let id = launcher.launch(job, params()).unwrap().id();
        let execution = operator.wait_for(id, Duration::from_secs(5)).unwrap();
        assert_eq!(execution.status, BatchStatus::Completed);

        let summaries = operator.summaries(id).unwrap();
        let expected: BTreeMap<u64, String> = execution
            .step_executions
            .iter()
            .map(|s| (s.id, s.summary_text()))
            .collect();
        assert_eq!(summaries, expected);
        assert_eq!(
            summaries.values().cloned().collect::<Vec<_>>(),
            vec!["A-ok", "B-ok"]
        );
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let job = JobDefinition::builder("j").step("a", ok("a")).build().unwrap();
        let (_, operator, _) = setup(job);

        assert!(matches!(operator.summaries(99), Err(OperatorError::NotFound(99))));
        assert!(matches!(operator.execution(99), Err(OperatorError::NotFound(99))));
        assert!(matches!(
            operator.wait_for(99, Duration::from_millis(10)),
            Err(OperatorError::NotFound(99))
        ));
    }

    #[test]
    fn test_parameters_and_job_names() {
        let job = JobDefinition::builder("sampleJob").step("a", ok("a")).build().unwrap();
        let (launcher, operator, job) = setup(job);

        let id = launcher.launch(job, params()).unwrap().id();
        assert_eq!(operator.parameters(id).unwrap(), params());
        assert_eq!(operator.job_names(), vec!["sampleJob"]);
    }

    #[test]
    fn test_running_executions_and_timeout() {
        let (release, gate) = channel::<()>();
        let gate = Mutex::new(gate);
        let blocking = move |_: &StepContext| -> Result<StepOutcome, StepFailure> {
            let gate = gate.lock().map_err(|_| StepFailure::new("poisoned"))?;
            gate.recv().map_err(|_| StepFailure::new("closed"))?;
            Ok(StepOutcome::finished())
        };
        let job = JobDefinition::builder("slowJob")
            .step("wait", blocking)
            .build()
            .unwrap();
        let (launcher, operator, job) = setup(job);

        let id = launcher.launch(job, params()).unwrap().id();
        assert_eq!(operator.running_executions("slowJob").unwrap(), vec![id]);
        assert!(matches!(
            operator.wait_for(id, Duration::from_millis(50)),
            Err(OperatorError::Timeout { .. })
        ));

        release.send(()).unwrap();
        let execution = operator.wait_for(id, Duration::from_secs(5)).unwrap();
        assert_eq!(execution.status, BatchStatus::Completed);
        assert!(operator.running_executions("slowJob").unwrap().is_empty());
    }
}
