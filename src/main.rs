//! batchrun CLI Entry Point
//!
//! Provides command-line interface for launching jobs and inspecting
//! recorded executions.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in sample job
//! batchrun
//!
//! # Run a job file with extra parameters
//! batchrun nightly.yaml --param "limit(long)=10"
//!
//! # Keep execution records between runs
//! batchrun nightly.yaml --store /var/lib/batchrun
//!
//! # Show step summaries of a recorded execution
//! batchrun --store /var/lib/batchrun --summary 3
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use log::{error, info};

use batchrun::execution::{JobLauncher, JobOperator};
use batchrun::job::{load_job, JobDefinition, JobParameters, JobRegistry};
use batchrun::monitoring::ExecutionTimeline;
use batchrun::repository::{BatchStatus, InMemoryJobRepository, JobExecution, JobRepository};
use batchrun::service::{JobService, Request};
use batchrun::{sample_job, APP_NAME, VERSION};

/// Default seconds to wait for a launched job.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    job_path: Option<PathBuf>,
    parameters: JobParameters,
    store_dir: Option<PathBuf>,
    summary_id: Option<u64>,
    timeout: Duration,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job_path: None,
            parameters: JobParameters::new(),
            store_dir: None,
            summary_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Sequential Batch Job Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: batchrun [OPTIONS] [JOB_FILE]");
    println!();
    println!("Arguments:");
    println!("  [JOB_FILE]                  Job definition YAML (default: built-in sampleJob)");
    println!();
    println!("Options:");
    println!("  --param NAME[(TYPE)]=VALUE  Add a job parameter (repeatable)");
    println!("  --store DIR                 Persist execution records as JSON in DIR");
    println!("  --summary ID                Print step summaries of a recorded execution");
    println!(
        "  --timeout SECS              Seconds to wait for completion (default: {})",
        DEFAULT_TIMEOUT_SECS
    );
    println!("  --verbose                   Enable debug logging");
    println!("  --help                      Show this help message");
    println!("  --version                   Show version information");
    println!();
    println!("Parameter types: string, date, long, double, boolean");
    println!();
    println!("Examples:");
    println!("  batchrun");
    println!("  batchrun report.yaml --param \"run.date(date)=2024-01-31\"");
    println!("  batchrun --store ./records --summary 2");
}

/// Returns the value following an option, advancing the cursor.
fn option_value<'a>(
    args: &'a [String],
    i: &mut usize,
    option: &str,
) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut extra = Vec::new();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--param" | "-p" => {
                let assignment = option_value(args, &mut i, "--param")?;
                let parameter =
                    JobParameters::parse_assignment(assignment).map_err(|e| e.to_string())?;
                extra.push(parameter);
            }
            "--store" => {
                config.store_dir = Some(PathBuf::from(option_value(args, &mut i, "--store")?));
            }
            "--summary" => {
                let value = option_value(args, &mut i, "--summary")?;
                config.summary_id = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid execution id: {}", value))?,
                );
            }
            "--timeout" => {
                let value = option_value(args, &mut i, "--timeout")?;
                let secs: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout value: {}", value))?;
                config.timeout = Duration::from_secs(secs);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.job_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.job_path = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    config.parameters = extra.into_iter().collect();
    Ok(config)
}

/// Opens the execution record store.
fn open_repository(
    store_dir: Option<&PathBuf>,
) -> Result<Arc<dyn JobRepository>, Box<dyn std::error::Error>> {
    let repository = match store_dir {
        Some(dir) => {
            info!("Execution records: {}", dir.display());
            InMemoryJobRepository::open_dir(dir)?
        }
        None => InMemoryJobRepository::new(),
    };
    Ok(Arc::new(repository))
}

fn colored_status(status: BatchStatus) -> colored::ColoredString {
    match status {
        BatchStatus::Completed => status.as_str().green().bold(),
        BatchStatus::Failed => status.as_str().red().bold(),
        _ => status.as_str().yellow().bold(),
    }
}

/// Prints the outcome of a finished execution.
fn print_report(execution: &JobExecution, summaries: &serde_json::Value) {
    println!();
    println!(
        "Job '{}' execution {}: {}",
        execution.job_name(),
        execution.id,
        colored_status(execution.status)
    );
    println!("Parameters: {}", execution.parameters());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(summaries).unwrap_or_else(|_| summaries.to_string())
    );
    print!("{}", ExecutionTimeline::from_execution(execution).gantt_chart());
}

/// Wired-up engine for one CLI invocation.
struct Runtime {
    launcher: JobLauncher,
    operator: JobOperator,
    service: JobService,
    /// Job loaded from JOB_FILE with its file parameters
    file_job: Option<(Arc<JobDefinition>, JobParameters)>,
}

/// Opens the store, registers jobs and builds the service.
fn build_runtime(config: &Config) -> Result<Runtime, Box<dyn std::error::Error>> {
    let repository = open_repository(config.store_dir.as_ref())?;

    // Register jobs
    let mut registry = JobRegistry::new();
    registry.register(sample_job()?)?;

    let file_job = match &config.job_path {
        Some(path) => {
            let loaded = load_job(path).map_err(|e| {
                error!("Failed to load job: {}", e);
                format!("Could not load job from '{}': {}", path.display(), e)
            })?;
            Some((registry.register(loaded.definition)?, loaded.parameters))
        }
        None => None,
    };
    let registry = Arc::new(registry);

    let launcher = JobLauncher::new(Arc::clone(&repository));
    let operator = JobOperator::new(repository, Arc::clone(&registry));
    let service = JobService::new(registry, launcher.clone(), operator.clone())
        .with_parameters(config.parameters.clone());

    Ok(Runtime {
        launcher,
        operator,
        service,
        file_job,
    })
}

/// Launches the file job, or the sample job through the service. Command
/// line parameters override defaults of the same name in both cases.
fn launch(runtime: &Runtime, config: &Config) -> Result<u64, Box<dyn std::error::Error>> {
    match &runtime.file_job {
        Some((job, file_parameters)) => {
            let parameters = file_parameters.merged_with(&config.parameters);
            info!("Launching '{}' with {}", job.name(), parameters);
            Ok(runtime.launcher.launch(Arc::clone(job), parameters)?.id())
        }
        None => Ok(runtime.service.create_job()?),
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    let runtime = build_runtime(&config)?;

    // Summary lookup only
    if let Some(id) = config.summary_id {
        let response = runtime.service.handle(Request::JobDetails(id));
        println!("{}", serde_json::to_string_pretty(&response.body)?);
        if !response.is_success() {
            return Err(format!("Lookup of execution {} answered {}", id, response.status).into());
        }
        return Ok(());
    }

    print_banner();

    let id = launch(&runtime, &config)?;
    let execution = runtime.operator.wait_for(id, config.timeout)?;
    let summaries = runtime.service.handle(Request::JobDetails(id));
    print_report(&execution, &summaries.body);

    if execution.status != BatchStatus::Completed {
        return Err(format!("Job execution {} finished {}", id, execution.status).into());
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("batchrun")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = parse_arguments(&args(&[])).unwrap();
        assert!(config.job_path.is_none());
        assert!(config.parameters.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_job_file_and_params() {
        let config = parse_arguments(&args(&[
            "report.yaml",
            "--param",
            "id=run-7",
            "--param",
            "limit(long)=10",
            "--timeout",
            "5",
        ]))
        .unwrap();

        assert_eq!(config.job_path, Some(PathBuf::from("report.yaml")));
        assert_eq!(config.parameters.get_string("id"), Some("run-7"));
        assert_eq!(config.parameters.get_long("limit"), Some(10));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_summary_and_store() {
        let config =
            parse_arguments(&args(&["--store", "/tmp/records", "--summary", "3"])).unwrap();
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/records")));
        assert_eq!(config.summary_id, Some(3));
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(parse_arguments(&args(&["--summary", "abc"])).is_err());
        assert!(parse_arguments(&args(&["--param"])).is_err());
        assert!(parse_arguments(&args(&["--bogus"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "b.yaml"])).is_err());
    }

    #[test]
    fn test_params_reach_the_sample_job() {
        let config = parse_arguments(&args(&[
            "--param",
            "limit(long)=3",
            "--param",
            "id(long)=5",
        ]))
        .unwrap();
        let runtime = build_runtime(&config).unwrap();

        let id = launch(&runtime, &config).unwrap();
        let execution = runtime
            .operator
            .wait_for(id, Duration::from_secs(5))
            .unwrap();

        assert_eq!(execution.job_name(), "sampleJob");
        assert_eq!(execution.parameters().get_long("limit"), Some(3));
        assert_eq!(execution.parameters().get_long("id"), Some(5));
        assert!(execution.parameters().get_date("date").is_some());
        assert_eq!(execution.status, BatchStatus::Completed);
    }
}
