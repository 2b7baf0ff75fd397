//! Job Definitions
//!
//! A job is a name plus an ordered list of named steps. Definitions are
//! validated when built and never change afterwards.
//!
//! # Example
//!
//! ```
//! use batchrun::job::{JobDefinition, LogParameterStep};
//!
//! let job = JobDefinition::builder("sampleJob")
//!     .step("taskletA", LogParameterStep::new("id"))
//!     .step("taskletB", LogParameterStep::new("id"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(job.step_names(), vec!["taskletA", "taskletB"]);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::debug;

use super::step::Step;
use crate::error::ConfigurationError;

/// A step registered under a name within one job.
#[derive(Clone)]
pub struct NamedStep {
    name: String,
    step: Arc<dyn Step>,
}

impl NamedStep {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self) -> &dyn Step {
        self.step.as_ref()
    }
}

impl fmt::Debug for NamedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedStep").field("name", &self.name).finish()
    }
}

/// Immutable, validated job definition.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    name: String,
    steps: Vec<NamedStep>,
}

impl JobDefinition {
    /// Starts building a job with the given name.
    pub fn builder(name: impl Into<String>) -> JobDefinitionBuilder {
        JobDefinitionBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[NamedStep] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builder for [`JobDefinition`]. Validation happens in [`build`](Self::build).
pub struct JobDefinitionBuilder {
    name: String,
    steps: Vec<NamedStep>,
}

impl JobDefinitionBuilder {
    /// Appends a step.
    pub fn step(self, name: impl Into<String>, step: impl Step + 'static) -> Self {
        self.shared_step(name, Arc::new(step))
    }

    /// Appends an already shared step instance. The same instance may be
    /// registered several times under different names.
    pub fn shared_step(mut self, name: impl Into<String>, step: Arc<dyn Step>) -> Self {
        self.steps.push(NamedStep {
            name: name.into().trim().to_string(),
            step,
        });
        self
    }

    /// Validates and freezes the definition.
    ///
    /// Rejects an empty job name, a job without steps, empty step names
    /// and duplicate step names.
    pub fn build(self) -> Result<JobDefinition, ConfigurationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigurationError::EmptyJobName);
        }

        if self.steps.is_empty() {
            return Err(ConfigurationError::EmptyJob(name));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if step.name.is_empty() {
                return Err(ConfigurationError::EmptyStepName(name));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(ConfigurationError::DuplicateStepName {
                    job: name,
                    step: step.name.clone(),
                });
            }
        }

        debug!("Job '{}' defined with {} steps", name, self.steps.len());

        Ok(JobDefinition {
            name,
            steps: self.steps,
        })
    }
}
