//! Step Capability
//!
//! A step is a named unit of work inside a job. Anything implementing
//! [`Step`] can be placed in a [`JobDefinition`](super::JobDefinition),
//! including plain closures:
//!
//! ```
//! use batchrun::job::{StepContext, StepFailure, StepOutcome};
//!
//! let step = |ctx: &StepContext| -> Result<StepOutcome, StepFailure> {
//!     let id = ctx.parameters().get_string("id").unwrap_or("anonymous");
//!     Ok(StepOutcome::finished().with_summary(format!("greeted {}", id)))
//! };
//! # let _ = step;
//! ```

use std::fmt;

use log::info;

use super::parameters::JobParameters;

/// What a step asks the launcher to do after one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatStatus {
    /// The step is done
    Finished,
    /// The step wants to be invoked again
    Continuable,
}

/// Result of one successful step invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub status: RepeatStatus,
    pub summary: Option<String>,
}

impl StepOutcome {
    pub fn finished() -> Self {
        Self {
            status: RepeatStatus::Finished,
            summary: None,
        }
    }

    pub fn continuable() -> Self {
        Self {
            status: RepeatStatus::Continuable,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// A step signalled failure. The reason is recorded as the step summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub reason: String,
}

impl StepFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for StepFailure {}

/// Read-only view of the enclosing job execution handed to a step.
#[derive(Debug, Clone)]
pub struct StepContext {
    job_name: String,
    job_execution_id: u64,
    step_name: String,
    step_execution_id: u64,
    parameters: JobParameters,
}

impl StepContext {
    pub fn new(
        job_name: impl Into<String>,
        job_execution_id: u64,
        step_name: impl Into<String>,
        step_execution_id: u64,
        parameters: JobParameters,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            job_execution_id,
            step_name: step_name.into(),
            step_execution_id,
            parameters,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn job_execution_id(&self) -> u64 {
        self.job_execution_id
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn step_execution_id(&self) -> u64 {
        self.step_execution_id
    }

    /// Parameters the job execution was launched with.
    pub fn parameters(&self) -> &JobParameters {
        &self.parameters
    }
}

/// A unit of work run by the launcher.
///
/// Steps run on the launcher's worker thread, so they must be shareable
/// across threads. A step may be registered under several names.
pub trait Step: Send + Sync {
    fn run(&self, context: &StepContext) -> Result<StepOutcome, StepFailure>;
}

impl<F> Step for F
where
    F: Fn(&StepContext) -> Result<StepOutcome, StepFailure> + Send + Sync,
{
    fn run(&self, context: &StepContext) -> Result<StepOutcome, StepFailure> {
        self(context)
    }
}

/// Logs the value of one job parameter.
///
/// Fails when the parameter was not supplied at launch.
#[derive(Debug, Clone)]
pub struct LogParameterStep {
    parameter: String,
}

impl LogParameterStep {
    pub fn new(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
        }
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }
}

impl Step for LogParameterStep {
    fn run(&self, context: &StepContext) -> Result<StepOutcome, StepFailure> {
        let value = context.parameters().get(&self.parameter).ok_or_else(|| {
            StepFailure::new(format!("missing job parameter '{}'", self.parameter))
        })?;

        info!("[{}] {}: {}", context.step_name(), self.parameter, value);

        Ok(StepOutcome::finished().with_summary(format!("{}={}", self.parameter, value)))
    }
}
