//! Execution Monitoring Module
//!
//! Provides reporting over recorded job executions.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Step start/end timing for Gantt charts

pub mod timeline;

pub use timeline::{ExecutionTimeline, TimelineEntry};
