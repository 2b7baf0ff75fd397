//! Execution Archive
//!
//! Durable copies of job execution records. The in-memory store writes
//! every change through its archive before the change becomes visible, so
//! a record that failed to persist is never observed.
//!
//! [`JsonDirArchive`] keeps one `job-execution-{id}.json` file per
//! execution in a directory.
//!
//! Records that cannot be read back are skipped on load, but their ids stay
//! reserved so a reopened store never hands them out again.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::model::JobExecution;
use crate::error::RepositoryError;

/// Durable backing for execution records.
pub trait ExecutionArchive: Send + Sync {
    /// Persists the full current state of one job execution.
    fn store(&self, execution: &JobExecution) -> Result<(), RepositoryError>;

    /// Reads back every archived execution, plus the ids still claimed by
    /// records that could not be read.
    fn load_all(&self) -> Result<ArchiveContents, RepositoryError>;
}

/// Highest ids claimed by archived records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservedIds {
    pub instance: u64,
    pub job_execution: u64,
    pub step_execution: u64,
}

impl ReservedIds {
    /// Folds the ids of a readable record into the reservation.
    pub fn include(&mut self, execution: &JobExecution) {
        self.instance = self.instance.max(execution.job_instance.id);
        self.job_execution = self.job_execution.max(execution.id);
        self.step_execution = execution
            .step_executions
            .iter()
            .map(|s| s.id)
            .fold(self.step_execution, u64::max);
    }

    /// Folds whatever ids can still be found in a record that no longer
    /// deserializes as a [`JobExecution`].
    fn include_raw(&mut self, value: &serde_json::Value) {
        let id_of = |v: &serde_json::Value| v.get("id").and_then(serde_json::Value::as_u64);

        if let Some(id) = id_of(value) {
            self.job_execution = self.job_execution.max(id);
        }
        if let Some(id) = value.get("job_instance").and_then(id_of) {
            self.instance = self.instance.max(id);
        }
        if let Some(steps) = value.get("step_executions").and_then(|v| v.as_array()) {
            self.step_execution = steps
                .iter()
                .filter_map(id_of)
                .fold(self.step_execution, u64::max);
        }
    }
}

/// Result of reading an archive back.
#[derive(Debug, Default)]
pub struct ArchiveContents {
    /// Readable executions, sorted by id
    pub executions: Vec<JobExecution>,
    /// Ids claimed by unreadable records
    pub reserved: ReservedIds,
}

/// Archive writing one pretty-printed JSON file per job execution.
#[derive(Debug, Clone)]
pub struct JsonDirArchive {
    dir: PathBuf,
}

const FILE_PREFIX: &str = "job-execution-";
const FILE_SUFFIX: &str = ".json";

impl JsonDirArchive {
    /// Opens (and creates if needed) an archive directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| unavailable(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, job_execution_id: u64) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, job_execution_id, FILE_SUFFIX))
    }

    fn is_record_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX))
            .unwrap_or(false)
    }

    /// Execution id encoded in a record file name.
    fn record_id(path: &Path) -> Option<u64> {
        path.file_name()?
            .to_str()?
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_SUFFIX)?
            .parse()
            .ok()
    }
}

fn unavailable(path: &Path, error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {}", path.display(), error))
}

impl ExecutionArchive for JsonDirArchive {
    fn store(&self, execution: &JobExecution) -> Result<(), RepositoryError> {
        let path = self.file_path(execution.id);
        let json = serde_json::to_string_pretty(execution).map_err(|e| unavailable(&path, e))?;

        // Write then rename so readers never see a truncated file
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| unavailable(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| unavailable(&path, e))?;

        debug!("Archived job execution {} to {}", execution.id, path.display());
        Ok(())
    }

    fn load_all(&self) -> Result<ArchiveContents, RepositoryError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| unavailable(&self.dir, e))?;

        let mut contents = ArchiveContents::default();
        for entry in entries {
            let path = entry.map_err(|e| unavailable(&self.dir, e))?.path();
            if !Self::is_record_file(&path) {
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|e| unavailable(&path, e))?;
            match serde_json::from_str::<JobExecution>(&content) {
                Ok(execution) => contents.executions.push(execution),
                Err(e) => {
                    warn!("Skipping unreadable record {}: {}", path.display(), e);
                    if let Some(id) = Self::record_id(&path) {
                        contents.reserved.job_execution = contents.reserved.job_execution.max(id);
                    }
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
                        contents.reserved.include_raw(&value);
                    }
                }
            }
        }

        contents.executions.sort_by_key(|e| e.id);
        info!(
            "Loaded {} job executions from {}",
            contents.executions.len(),
            self.dir.display()
        );

        Ok(contents)
    }
}
