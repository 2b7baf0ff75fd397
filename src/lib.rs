//! batchrun - Sequential Batch Job Engine
//!
//! Runs jobs made of ordered steps on background threads and records every
//! job and step execution, so clients can launch work and later ask what
//! each step reported.
//!
//! # Architecture
//!
//! The library is organized into five main modules:
//!
//! - [`job`]: Job definitions, parameters, steps and YAML job files
//! - [`repository`]: Execution records and the stores that keep them
//! - [`execution`]: Asynchronous launcher and read-only job operator
//! - [`monitoring`]: Step timelines derived from execution records
//! - [`service`]: The `create-job` / `job/{id}` client boundary
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use batchrun::execution::{JobLauncher, JobOperator};
//! use batchrun::job::{JobParameters, JobRegistry};
//! use batchrun::repository::{InMemoryJobRepository, JobRepository};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
//!     let mut registry = JobRegistry::new();
//!     let job = registry.register(batchrun::sample_job()?)?;
//!
//!     let launcher = JobLauncher::new(Arc::clone(&repository));
//!     let operator = JobOperator::new(repository, Arc::new(registry));
//!
//!     let params = JobParameters::builder().add_string("id", "testing 123").build();
//!     let handle = launcher.launch(job, params)?;
//!
//!     operator.wait_for(handle.id(), Duration::from_secs(10))?;
//!     println!("{:?}", operator.summaries(handle.id())?);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod job;
pub mod monitoring;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use error::{ConfigurationError, LaunchError, OperatorError, RepositoryError};
pub use execution::{JobLauncher, JobOperator};
pub use job::{load_job, JobDefinition, JobParameters, LogParameterStep};
pub use repository::{BatchStatus, InMemoryJobRepository, JobRepository};
pub use service::{JobService, Request, Response};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "batchrun";

/// Builds the built-in `sampleJob`: two steps that each log the `id`
/// job parameter.
pub fn sample_job() -> Result<JobDefinition, ConfigurationError> {
    JobDefinition::builder(service::DEFAULT_JOB_NAME)
        .step("taskletA", LogParameterStep::new("id"))
        .step("taskletB", LogParameterStep::new("id"))
        .build()
}
