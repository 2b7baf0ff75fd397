//! Job Execution Module
//!
//! Runs job definitions and reads back what happened.
//!
//! # Architecture
//!
//! - [`launcher`]: Asynchronous launch of a job on a worker thread
//! - [`operator`]: Read-only queries over recorded executions
//! - [`command`]: Shell command step kind

pub mod command;
pub mod launcher;
pub mod operator;

pub use command::CommandStep;
pub use launcher::{JobHandle, JobLauncher};
pub use operator::JobOperator;
