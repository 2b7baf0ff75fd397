//! In-Memory Execution Record Store
//!
//! Keeps every job execution behind its own mutex, so writes to one
//! execution are serialized without blocking other executions. The index
//! of executions and instances sits behind a read/write lock that is only
//! taken for writing when a new job execution is created.
//!
//! An optional [`ExecutionArchive`] makes the store durable: each change is
//! applied to a copy, archived, and only then swapped in.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use log::{debug, warn};

use super::archive::{ExecutionArchive, JsonDirArchive};
use super::model::{BatchStatus, JobExecution, JobInstance, StepExecution};
use super::JobRepository;
use crate::error::RepositoryError;
use crate::job::JobParameters;

type Record = Arc<Mutex<JobExecution>>;

#[derive(Default)]
struct Index {
    instances: Vec<JobInstance>,
    executions: BTreeMap<u64, Record>,
}

/// Thread-safe execution record store.
pub struct InMemoryJobRepository {
    index: RwLock<Index>,
    next_instance_id: AtomicU64,
    next_job_execution_id: AtomicU64,
    next_step_execution_id: AtomicU64,
    archive: Option<Box<dyn ExecutionArchive>>,
}

fn poisoned<T>(_: PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("record lock poisoned by a panicking writer".to_string())
}

impl InMemoryJobRepository {
    /// Creates an empty, purely in-memory store. Ids start at 1.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Index::default()),
            next_instance_id: AtomicU64::new(1),
            next_job_execution_id: AtomicU64::new(1),
            next_step_execution_id: AtomicU64::new(1),
            archive: None,
        }
    }

    /// Creates a store backed by `archive`, reloading every archived
    /// execution. Id counters continue after the highest ids the archive
    /// holds, including ids of records it could not read back.
    pub fn with_archive(archive: impl ExecutionArchive + 'static) -> Result<Self, RepositoryError> {
        let contents = archive.load_all()?;

        let mut index = Index::default();
        let mut reserved = contents.reserved;

        for execution in contents.executions {
            if execution.is_running() {
                warn!(
                    "Job execution {} ({}) was left {} by a previous process",
                    execution.id,
                    execution.job_name(),
                    execution.status
                );
            }

            let instance = &execution.job_instance;
            if !index.instances.iter().any(|i| i.id == instance.id) {
                index.instances.push(instance.clone());
            }

            reserved.include(&execution);
            index
                .executions
                .insert(execution.id, Arc::new(Mutex::new(execution)));
        }

        index.instances.sort_by_key(|i| i.id);
        if reserved.job_execution > 0 {
            debug!(
                "Resuming ids after instance {}, job execution {}, step execution {}",
                reserved.instance, reserved.job_execution, reserved.step_execution
            );
        }

        Ok(Self {
            index: RwLock::new(index),
            next_instance_id: AtomicU64::new(reserved.instance + 1),
            next_job_execution_id: AtomicU64::new(reserved.job_execution + 1),
            next_step_execution_id: AtomicU64::new(reserved.step_execution + 1),
            archive: Some(Box::new(archive)),
        })
    }

    /// Opens a store archived as JSON files in `dir`.
    pub fn open_dir(dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        Self::with_archive(JsonDirArchive::open(dir)?)
    }

    /// Number of job executions held.
    pub fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .executions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, job_execution_id: u64) -> Result<Record, RepositoryError> {
        let index = self.index.read().map_err(poisoned)?;
        index
            .executions
            .get(&job_execution_id)
            .cloned()
            .ok_or(RepositoryError::JobExecutionNotFound(job_execution_id))
    }

    fn persist(&self, execution: &JobExecution) -> Result<(), RepositoryError> {
        match &self.archive {
            Some(archive) => archive.store(execution),
            None => Ok(()),
        }
    }

    /// Applies `change` to one job execution under its lock.
    ///
    /// The change runs on a copy; the copy replaces the record only after
    /// it was archived, so a failed change leaves the record untouched.
    fn modify<T, F>(&self, job_execution_id: u64, change: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut JobExecution) -> Result<T, RepositoryError>,
    {
        let record = self.record(job_execution_id)?;
        let mut current = record.lock().map_err(poisoned)?;

        let mut updated = current.clone();
        let result = change(&mut updated)?;
        self.persist(&updated)?;
        *current = updated;

        Ok(result)
    }
}

impl Default for InMemoryJobRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryJobRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryJobRepository")
            .field("executions", &self.len())
            .field("archived", &self.archive.is_some())
            .finish()
    }
}

impl JobRepository for InMemoryJobRepository {
    fn create_job_execution(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<JobExecution, RepositoryError> {
        let mut index = self.index.write().map_err(poisoned)?;

        let existing = index
            .instances
            .iter()
            .find(|i| i.job_name == job_name && &i.parameters == parameters)
            .cloned();
        let is_new_instance = existing.is_none();
        let job_instance = existing.unwrap_or_else(|| JobInstance {
            id: self.next_instance_id.fetch_add(1, Ordering::SeqCst),
            job_name: job_name.to_string(),
            parameters: parameters.clone(),
        });

        let execution = JobExecution {
            id: self.next_job_execution_id.fetch_add(1, Ordering::SeqCst),
            job_instance,
            status: BatchStatus::Starting,
            create_time: Utc::now(),
            start_time: None,
            end_time: None,
            step_executions: Vec::new(),
        };

        // Nothing becomes visible unless the archive accepted the record
        self.persist(&execution)?;

        if is_new_instance {
            index.instances.push(execution.job_instance.clone());
        }
        index
            .executions
            .insert(execution.id, Arc::new(Mutex::new(execution.clone())));

        debug!(
            "Created job execution {} for '{}' (instance {})",
            execution.id, job_name, execution.job_instance.id
        );

        Ok(execution)
    }

    fn update_job_execution(
        &self,
        job_execution_id: u64,
        status: BatchStatus,
    ) -> Result<JobExecution, RepositoryError> {
        self.modify(job_execution_id, |execution| {
            if execution.status.is_terminal() {
                return Err(RepositoryError::AlreadyTerminal {
                    id: execution.id,
                    status: execution.status,
                });
            }

            let completes_with_unfinished_steps =
                status == BatchStatus::Completed && !execution.all_steps_completed();
            if !execution.status.can_transition_to(status) || completes_with_unfinished_steps {
                return Err(RepositoryError::InvalidTransition {
                    id: execution.id,
                    from: execution.status,
                    to: status,
                });
            }

            let now = Utc::now();
            if status == BatchStatus::Started {
                execution.start_time = Some(now);
            }
            if status.is_terminal() {
                execution.end_time = Some(now);
            }
            execution.status = status;

            Ok(execution.clone())
        })
    }

    fn create_step_execution(
        &self,
        job_execution_id: u64,
        step_name: &str,
    ) -> Result<StepExecution, RepositoryError> {
        self.modify(job_execution_id, |execution| {
            if execution.status.is_terminal() {
                return Err(RepositoryError::AlreadyTerminal {
                    id: execution.id,
                    status: execution.status,
                });
            }

            let step = StepExecution {
                id: self.next_step_execution_id.fetch_add(1, Ordering::SeqCst),
                job_execution_id,
                step_name: step_name.to_string(),
                status: BatchStatus::Started,
                start_time: Utc::now(),
                end_time: None,
                summary: None,
            };
            execution.step_executions.push(step.clone());

            Ok(step)
        })
    }

    fn update_step_execution(
        &self,
        step_execution: &StepExecution,
        status: BatchStatus,
        summary: Option<String>,
    ) -> Result<StepExecution, RepositoryError> {
        if !status.is_terminal() {
            return Err(RepositoryError::InvalidTransition {
                id: step_execution.id,
                from: step_execution.status,
                to: status,
            });
        }

        self.modify(step_execution.job_execution_id, |execution| {
            let step = execution
                .step_executions
                .iter_mut()
                .find(|s| s.id == step_execution.id)
                .ok_or(RepositoryError::StepExecutionNotFound(step_execution.id))?;

            if step.status.is_terminal() {
                return Err(RepositoryError::AlreadyTerminal {
                    id: step.id,
                    status: step.status,
                });
            }

            step.status = status;
            step.end_time = Some(Utc::now());
            step.summary = summary;

            Ok(step.clone())
        })
    }

    fn job_execution(&self, job_execution_id: u64) -> Result<JobExecution, RepositoryError> {
        let record = self.record(job_execution_id)?;
        let execution = record.lock().map_err(poisoned)?;
        Ok(execution.clone())
    }

    fn job_executions(&self, job_name: &str) -> Result<Vec<JobExecution>, RepositoryError> {
        let records: Vec<Record> = {
            let index = self.index.read().map_err(poisoned)?;
            index.executions.values().cloned().collect()
        };

        let mut executions = Vec::new();
        for record in records {
            let execution = record.lock().map_err(poisoned)?;
            if execution.job_name() == job_name {
                executions.push(execution.clone());
            }
        }
        Ok(executions)
    }

    fn job_instances(&self, job_name: &str) -> Result<Vec<JobInstance>, RepositoryError> {
        let index = self.index.read().map_err(poisoned)?;
        Ok(index
            .instances
            .iter()
            .filter(|i| i.job_name == job_name)
            .cloned()
            .collect())
    }
}
