//! Job Service Boundary
//!
//! Transport-agnostic form of the two operations exposed to clients:
//!
//! - `create-job`: launch the configured job with default parameters and
//!   answer with the new execution id
//! - `job/{id}`: answer with the step summaries of an execution
//!
//! Responses carry an HTTP-style status code and a JSON body, so any
//! transport can forward them unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::{LaunchError, OperatorError};
use crate::execution::{JobLauncher, JobOperator};
use crate::job::{JobParameters, JobRegistry};

/// Job launched by `create-job` unless configured otherwise.
pub const DEFAULT_JOB_NAME: &str = "sampleJob";

/// Value of the `id` parameter passed by `create-job`.
pub const DEFAULT_ID_PARAMETER: &str = "testing 123";

/// Failures visible to service clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Job '{0}' is not registered")]
    UnknownJob(String),

    #[error("Not able to launch job: {0}")]
    Launch(#[from] LaunchError),

    #[error("No job execution with id {0}")]
    NotFound(u64),

    #[error(transparent)]
    Operator(OperatorError),
}

impl From<OperatorError> for ServiceError {
    fn from(error: OperatorError) -> Self {
        match error {
            OperatorError::NotFound(id) => Self::NotFound(id),
            other => Self::Operator(other),
        }
    }
}

impl ServiceError {
    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            _ => 500,
        }
    }
}

/// Operations a client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    CreateJob,
    JobDetails(u64),
}

/// Status code plus JSON body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(error: &ServiceError) -> Self {
        Self {
            status: error.status_code(),
            body: json!({ "error": error.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Service facade over the registry, launcher and operator.
pub struct JobService {
    registry: Arc<JobRegistry>,
    launcher: JobLauncher,
    operator: JobOperator,
    job_name: String,
    id_parameter: String,
    extra_parameters: JobParameters,
}

impl JobService {
    pub fn new(registry: Arc<JobRegistry>, launcher: JobLauncher, operator: JobOperator) -> Self {
        Self {
            registry,
            launcher,
            operator,
            job_name: DEFAULT_JOB_NAME.to_string(),
            id_parameter: DEFAULT_ID_PARAMETER.to_string(),
            extra_parameters: JobParameters::new(),
        }
    }

    /// Sets the job launched by `create-job`.
    pub fn with_job(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    /// Sets the `id` parameter value passed by `create-job`.
    pub fn with_id_parameter(mut self, id: impl Into<String>) -> Self {
        self.id_parameter = id.into();
        self
    }

    /// Adds parameters to every `create-job` launch. They override the
    /// defaults of the same name.
    pub fn with_parameters(mut self, parameters: JobParameters) -> Self {
        self.extra_parameters = parameters;
        self
    }

    pub fn operator(&self) -> &JobOperator {
        &self.operator
    }

    /// Parameters of a `create-job` launch: the current time as `date`
    /// (so every call is a new job instance), the configured `id`, and any
    /// extra parameters on top.
    pub fn default_parameters(&self) -> JobParameters {
        JobParameters::builder()
            .add_date("date", Utc::now())
            .add_string("id", self.id_parameter.clone())
            .build()
            .merged_with(&self.extra_parameters)
    }

    /// Launches the configured job and returns the execution id.
    ///
    /// The job keeps running after this returns.
    pub fn create_job(&self) -> Result<u64, ServiceError> {
        let job = self
            .registry
            .get(&self.job_name)
            .ok_or_else(|| ServiceError::UnknownJob(self.job_name.clone()))?;

        match self.launcher.launch(job, self.default_parameters()) {
            Ok(handle) => {
                info!("JOB EXECUTION ID: {}", handle.id());
                Ok(handle.id())
            }
            Err(e) => {
                error!("Not able to launch job '{}': {}", self.job_name, e);
                Err(ServiceError::Launch(e))
            }
        }
    }

    /// Step execution id → summary for one execution.
    pub fn job_details(
        &self,
        job_execution_id: u64,
    ) -> Result<BTreeMap<u64, String>, ServiceError> {
        Ok(self.operator.summaries(job_execution_id)?)
    }

    /// Serves one request.
    pub fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::CreateJob => self.create_job().map(|id| json!(id)),
            Request::JobDetails(id) => self.job_details(id).map(|summaries| json!(summaries)),
        };

        match result {
            Ok(body) => Response::ok(body),
            Err(e) => {
                if let ServiceError::NotFound(id) = &e {
                    debug!("{:?} answered 404 (unknown execution {})", request, id);
                }
                Response::error(&e)
            }
        }
    }
}
