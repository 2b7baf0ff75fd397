//! Job Definition Module
//!
//! Provides the types used to describe what a job does, before anything
//! runs.
//!
//! # Structure
//!
//! - [`parameters`]: Typed job parameters
//! - [`step`]: The step capability and built-in log step
//! - [`definition`]: Ordered, validated step sequences
//! - [`registry`]: Startup-time table of job definitions
//! - [`parser`]: YAML job files

pub mod definition;
pub mod parameters;
pub mod parser;
pub mod registry;
pub mod step;

pub use definition::{JobDefinition, JobDefinitionBuilder, NamedStep};
pub use parameters::{JobParameters, JobParametersBuilder, ParameterValue};
pub use parser::{load_job, parse_job, LoadedJob};
pub use registry::JobRegistry;
pub use step::{LogParameterStep, RepeatStatus, Step, StepContext, StepFailure, StepOutcome};
