//! Job File Parser
//!
//! Loads job definitions from YAML files.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: nightlyReport
//! parameters:
//!   id: "testing 123"
//!   "limit(long)": 10
//! steps:
//!   - name: announce
//!     kind: log
//!     parameter: id
//!   - name: render
//!     kind: command
//!     command: echo "rendering {id}"
//!     working_dir: /tmp
//! ```
//!
//! Parameter keys use the `name(type)` form of
//! [`JobParameters::parse_entry`]. They are defaults: parameters given at
//! launch time override them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::definition::JobDefinition;
use super::parameters::JobParameters;
use super::step::LogParameterStep;
use crate::error::ConfigurationError;
use crate::execution::CommandStep;

/// One step entry of a job file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepSpec {
    pub name: String,

    #[serde(flatten)]
    pub kind: StepKind,
}

/// Step kinds available in job files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Log one job parameter
    Log { parameter: String },
    /// Run a bash command line
    Command {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<PathBuf>,
    },
}

/// Raw contents of a job file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobFile {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_yaml::Value>,

    pub steps: Vec<StepSpec>,
}

/// A job definition loaded from a file, with the file's default parameters.
#[derive(Debug)]
pub struct LoadedJob {
    pub definition: JobDefinition,
    pub parameters: JobParameters,
}

impl JobFile {
    /// Builds the validated definition and default parameters.
    pub fn into_job(self) -> Result<LoadedJob, ConfigurationError> {
        let parameters = self
            .parameters
            .iter()
            .map(|(key, value)| JobParameters::parse_entry(key, &yaml_scalar(key, value)?))
            .collect::<Result<JobParameters, _>>()?;

        let mut builder = JobDefinition::builder(self.name);
        for spec in self.steps {
            builder = match spec.kind {
                StepKind::Log { parameter } => {
                    if parameter.trim().is_empty() {
                        return Err(ConfigurationError::InvalidStep {
                            step: spec.name,
                            reason: "log step needs a parameter name".to_string(),
                        });
                    }
                    builder.step(spec.name, LogParameterStep::new(parameter.trim()))
                }
                StepKind::Command {
                    command,
                    working_dir,
                } => {
                    if command.trim().is_empty() {
                        return Err(ConfigurationError::InvalidStep {
                            step: spec.name,
                            reason: "command step has no command".to_string(),
                        });
                    }
                    let mut step = CommandStep::new(command);
                    if let Some(dir) = working_dir {
                        step = step.with_working_dir(dir);
                    }
                    builder.step(spec.name, step)
                }
            };
        }

        Ok(LoadedJob {
            definition: builder.build()?,
            parameters,
        })
    }
}

/// Renders a YAML scalar as the raw text of a parameter value.
fn yaml_scalar(key: &str, value: &serde_yaml::Value) -> Result<String, ConfigurationError> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigurationError::InvalidParameter(format!(
            "parameter '{}' must be a string, number or boolean",
            key
        ))),
    }
}

/// Parses a job from YAML text.
pub fn parse_job(yaml: &str) -> Result<LoadedJob, ConfigurationError> {
    let file: JobFile = serde_yaml::from_str(yaml)
        .map_err(|e| ConfigurationError::Parse(format!("{}. Check the file format.", e)))?;

    debug!("Parsed job '{}' with {} steps", file.name, file.steps.len());
    file.into_job()
}

/// Loads a job from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use batchrun::job::load_job;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let loaded = load_job("nightly.yaml")?;
///     println!("Loaded {} steps", loaded.definition.len());
///     Ok(())
/// }
/// ```
pub fn load_job(path: impl AsRef<Path>) -> Result<LoadedJob, ConfigurationError> {
    let path = path.as_ref();
    info!("Loading job from: {}", path.display());

    let yaml = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_job(&yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
name: nightlyReport
parameters:
  id: "testing 123"
  "limit(long)": 10
  "run.date(date)": "2024-05-01"
steps:
  - name: announce
    kind: log
    parameter: id
  - name: render
    kind: command
    command: echo "rendering {id}"
"#;

    #[test]
    fn test_parse_sample_job() {
        let loaded = parse_job(SAMPLE).unwrap();

        assert_eq!(loaded.definition.name(), "nightlyReport");
        assert_eq!(loaded.definition.step_names(), vec!["announce", "render"]);
        assert_eq!(loaded.parameters.get_string("id"), Some("testing 123"));
        assert_eq!(loaded.parameters.get_long("limit"), Some(10));
        assert!(loaded.parameters.get_date("run.date").is_some());
    }

    #[test]
    fn test_parameters_are_optional() {
        let yaml = "name: j\nsteps:\n  - name: a\n    kind: log\n    parameter: id\n";
        let loaded = parse_job(yaml).unwrap();
        assert!(loaded.parameters.is_empty());
    }

    #[test]
    fn test_unknown_step_kind_rejected() {
        let yaml = "name: j\nsteps:\n  - name: a\n    kind: teleport\n";
        assert!(matches!(parse_job(yaml), Err(ConfigurationError::Parse(_))));
    }

    #[test]
    fn test_duplicate_step_names_rejected() {
        let yaml = r#"
name: j
steps:
  - name: a
    kind: log
    parameter: id
  - name: a
    kind: command
    command: "true"
"#;
        assert!(matches!(
            parse_job(yaml),
            Err(ConfigurationError::DuplicateStepName { .. })
        ));
    }

    #[test]
    fn test_empty_command_rejected() {
        let yaml = "name: j\nsteps:\n  - name: a\n    kind: command\n    command: \"  \"\n";
        assert!(matches!(
            parse_job(yaml),
            Err(ConfigurationError::InvalidStep { .. })
        ));
    }

    #[test]
    fn test_nested_parameter_value_rejected() {
        let yaml = "name: j\nparameters:\n  id: [1, 2]\n\
                    steps:\n  - name: a\n    kind: log\n    parameter: id\n";
        assert!(matches!(
            parse_job(yaml),
            Err(ConfigurationError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_load_job_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("job.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let loaded = load_job(&path).unwrap();
        assert_eq!(loaded.definition.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_job("/nonexistent/job.yaml");
        assert!(matches!(result, Err(ConfigurationError::Io { .. })));
    }
}
