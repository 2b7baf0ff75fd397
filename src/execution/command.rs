//! Shell Command Steps
//!
//! A step kind that runs a bash command line:
//! - `{name}` placeholders are replaced with job parameter values
//! - the command runs with `bash -c`, optionally in a working directory
//! - a non-zero exit fails the step with the tail of stderr

use std::path::PathBuf;
use std::process::Command;

use log::{debug, error};

use crate::job::{JobParameters, Step, StepContext, StepFailure, StepOutcome};

/// Number of stderr lines kept in a failure reason.
const STDERR_TAIL_LINES: usize = 5;

/// Runs a shell command as a step.
#[derive(Debug, Clone)]
pub struct CommandStep {
    command: String,
    working_dir: Option<PathBuf>,
}

impl CommandStep {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into().trim().to_string(),
            working_dir: None,
        }
    }

    /// Runs the command from `dir` instead of the process working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Replaces `{name}` placeholders with parameter values.
///
/// Unknown placeholders are left untouched.
pub fn substitute_parameters(template: &str, parameters: &JobParameters) -> String {
    parameters
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), &value.to_string())
        })
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

impl Step for CommandStep {
    fn run(&self, context: &StepContext) -> Result<StepOutcome, StepFailure> {
        let command_text = substitute_parameters(&self.command, context.parameters());
        debug!("[{}] $ {}", context.step_name(), command_text);

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(&command_text);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
            debug!("Executing in directory: {}", dir.display());
        }

        let output = cmd
            .output()
            .map_err(|e| StepFailure::new(format!("failed to start bash: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            error!(
                "Step '{}' command failed with exit code: {:?}",
                context.step_name(),
                output.status.code()
            );

            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let tail = stderr_tail(&stderr);

            return Err(StepFailure::new(if tail.is_empty() {
                format!("command exited with {}", code)
            } else {
                format!("command exited with {}: {}", code, tail)
            }));
        }

        if !stdout.trim().is_empty() {
            debug!("Step '{}' output:\n{}", context.step_name(), stdout);
        }

        let summary = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map_or_else(|| "exit status 0".to_string(), str::to_string);

        Ok(StepOutcome::finished().with_summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn context(parameters: JobParameters) -> StepContext {
        StepContext::new("job", 1, "cmd", 1, parameters)
    }

    #[test]
    fn test_substitute_parameters() {
        let params = JobParameters::builder()
            .add_string("id", "abc")
            .add_long("n", 3)
            .build();

        let text = substitute_parameters("echo {id} {n} {unknown}", &params);
        assert_eq!(text, "echo abc 3 {unknown}");
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = "1\n2\n\n3\n4\n5\n6\n7\n";
        assert_eq!(stderr_tail(stderr), "3\n4\n5\n6\n7");
    }

    #[test]
    fn test_command_summary_is_last_stdout_line() {
        let params = JobParameters::builder().add_string("id", "xyz").build();
        let step = CommandStep::new("echo first; echo 'hello {id}'");

        let outcome = step.run(&context(params)).unwrap();
        assert_eq!(outcome.summary.as_deref(), Some("hello xyz"));
    }

    #[test]
    fn test_silent_command_summary() {
        let step = CommandStep::new("true");
        let outcome = step.run(&context(JobParameters::new())).unwrap();
        assert_eq!(outcome.summary.as_deref(), Some("exit status 0"));
    }

    #[test]
    fn test_failing_command_reports_stderr() {
        let step = CommandStep::new("echo 'bad input' >&2; exit 3");
        let failure = step.run(&context(JobParameters::new())).unwrap_err();
        assert_eq!(failure.reason, "command exited with 3: bad input");
    }

    #[test]
    fn test_command_runs_in_working_dir() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("marker.txt"), "found").unwrap();

        let step = CommandStep::new("cat marker.txt").with_working_dir(temp_dir.path());
        let outcome = step.run(&context(JobParameters::new())).unwrap();
        assert_eq!(outcome.summary.as_deref(), Some("found"));
    }
}
