//! Job Registry
//!
//! Process-wide table of job definitions, filled once at startup and then
//! shared read-only with the launcher, operator and service.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use super::definition::JobDefinition;
use crate::error::ConfigurationError;

/// Name-indexed collection of job definitions.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: BTreeMap<String, Arc<JobDefinition>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition. Job names must be unique.
    pub fn register(
        &mut self,
        job: JobDefinition,
    ) -> Result<Arc<JobDefinition>, ConfigurationError> {
        if self.jobs.contains_key(job.name()) {
            return Err(ConfigurationError::DuplicateJob(job.name().to_string()));
        }

        info!("Registered job '{}' ({} steps)", job.name(), job.len());

        let job = Arc::new(job);
        self.jobs.insert(job.name().to_string(), Arc::clone(&job));
        Ok(job)
    }

    pub fn get(&self, name: &str) -> Option<Arc<JobDefinition>> {
        self.jobs.get(name).cloned()
    }

    /// Like [`get`](Self::get) but unknown names are a configuration error.
    pub fn require(&self, name: &str) -> Result<Arc<JobDefinition>, ConfigurationError> {
        self.get(name)
            .ok_or_else(|| ConfigurationError::UnknownJob(name.to_string()))
    }

    /// Registered job names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::LogParameterStep;

    fn job(name: &str) -> JobDefinition {
        JobDefinition::builder(name)
            .step("log", LogParameterStep::new("id"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = JobRegistry::new();
        registry.register(job("b")).unwrap();
        registry.register(job("a")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().name(), "a");
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_duplicate_job_rejected() {
        let mut registry = JobRegistry::new();
        registry.register(job("sampleJob")).unwrap();

        let result = registry.register(job("sampleJob"));
        assert!(matches!(result, Err(ConfigurationError::DuplicateJob(_))));
    }

    #[test]
    fn test_require_unknown_job() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.require("missing"),
            Err(ConfigurationError::UnknownJob(_))
        ));
    }
}
