//! release-deploy CLI entrypoint.
//!
//! This is the main entrypoint for the release-deploy command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use release_deploy::cli::{Cli, Commands, OutputFormatter};
use release_deploy::config::{
    ConfigParser, ConfigValidator, DEFAULT_CONFIG_FILES, RawDeployConfig, find_config_file,
};
use release_deploy::deployment::Deployment;
use release_deploy::error::{DeployError, Result};
use release_deploy::planner::{PipelineExecutor, ReleaseLog};
use release_deploy::scheduler::TaskRegistry;
use release_deploy::transport::{DryRunTransport, RemoteTransport, SshTransport};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Prints an error with its offending value and a retry hint.
fn report_error(error: &DeployError) {
    eprintln!("Error: {error}");
    if let DeployError::Config(config_error) = error {
        if let Some(detail) = config_error.detail() {
            eprintln!("  {:?}: {detail}", config_error.kind());
        }
    }
    if error.is_retryable() {
        eprintln!("  This failure may be transient; retrying may succeed.");
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point. Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let config = cli.config.as_ref();
    let version = cli.release_version.as_deref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force, &formatter),
        Commands::Validate => cmd_validate(config, &formatter),
        Commands::Plan => cmd_plan(config, version, &formatter),
        Commands::Tasks => cmd_tasks(config, version, &formatter),
        Commands::Run {
            task,
            dry_run,
            log_dir,
            no_log,
        } => {
            let log_dir = (!no_log).then_some(log_dir);
            cmd_run(config, version, &task, dry_run, log_dir, &formatter).await
        }
    }
}

/// Write a template configuration file.
fn cmd_init(path: &Path, force: bool, formatter: &OutputFormatter) -> Result<bool> {
    info!("Initializing release configuration in: {}", path.display());

    let config_path = path.join(DEFAULT_CONFIG_FILES[0]);

    if !force && config_path.exists() {
        eprintln!(
            "{}",
            formatter.warning(&format!(
                "Configuration file already exists: {}. Use --force to overwrite.",
                config_path.display()
            ))
        );
        return Ok(true);
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let config_template = include_str!("../templates/release-deploy.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("{}", formatter.success(&format!("Created: {}", config_path.display())));

    eprintln!("\nNext steps:");
    eprintln!("  1. Edit {} with your host and paths", DEFAULT_CONFIG_FILES[0]);
    eprintln!("  2. Run 'release-deploy validate' to check your configuration");
    eprintln!("  3. Run 'release-deploy plan' to see the task graph");
    eprintln!("  4. Run 'release-deploy run' to publish a release");

    Ok(true)
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let (config_file, raw) = load_raw(config_path)?;

    let mut registry = TaskRegistry::new();
    if let Some(raw) = &raw {
        registry.register_local_tasks(&raw.tasks)?;
    }
    let config = validator_for(&config_file).validate(raw.as_ref(), &registry)?;

    eprintln!("{}", formatter.success("Configuration is valid!"));
    eprintln!("\nConfiguration summary:");
    eprintln!("  Destination: {}:{}", config.destination(), config.port);
    eprintln!("  Remote directory: {}", config.remote_directory);
    eprintln!("  Credential: {}", config.credential_file.display());
    eprintln!("  Sources: {}", config.source_files.join(", "));
    if let Some(task) = &config.package_task {
        eprintln!("  Package task: {task}");
    }
    match config.retention() {
        Some(keep) => eprintln!("  Releases kept: {keep}"),
        None => eprintln!("  Releases kept: all"),
    }

    Ok(true)
}

/// Show the deployment task graph.
fn cmd_plan(
    config_path: Option<&PathBuf>,
    version: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let deployment = prepare(config_path, version)?;
    emit(&formatter.format_plan(&deployment));
    Ok(true)
}

/// List every registered task.
fn cmd_tasks(
    config_path: Option<&PathBuf>,
    version: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let deployment = prepare(config_path, version)?;
    emit(&formatter.format_tasks(&deployment.registry));
    Ok(true)
}

/// Run a task and its dependencies.
async fn cmd_run(
    config_path: Option<&PathBuf>,
    version: Option<&str>,
    task: &str,
    dry_run: bool,
    log_dir: Option<PathBuf>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let deployment = prepare(config_path, version)?;

    let transport: Box<dyn RemoteTransport> = if dry_run {
        Box::new(DryRunTransport::new())
    } else {
        Box::new(SshTransport::new(&deployment.config))
    };

    let mut executor = PipelineExecutor::new(transport.as_ref());
    if let Some(dir) = log_dir {
        let log = ReleaseLog::in_dir(dir);
        info!("Release log: {}", log.path().display());
        executor = executor.with_release_log(log);
    }

    let result = executor.run(&deployment.registry, task).await?;
    if !result.success {
        warn!("{result}");
    }
    emit(&formatter.format_execution(&result));

    Ok(result.success)
}

/// Writes command output to stdout.
#[allow(clippy::print_stdout)]
fn emit(output: &str) {
    println!("{output}");
}

/// Loads configuration and assembles the deployment.
fn prepare(config_path: Option<&PathBuf>, version: Option<&str>) -> Result<Deployment> {
    let (config_file, raw) = load_raw(config_path)?;
    Deployment::prepare(raw.as_ref(), &validator_for(&config_file), version)
}

/// Resolves the configuration file path, searching upward from the
/// working directory when none is given.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.clone()),
        None => find_config_file(std::env::current_dir()?),
    }
}

/// Returns the directory of the configuration file.
fn config_dir(config_file: &Path) -> &Path {
    config_file.parent().unwrap_or_else(|| Path::new(""))
}

/// Creates a validator resolving relative paths against the config file.
fn validator_for(config_file: &Path) -> ConfigValidator {
    ConfigValidator::new().with_base_dir(config_dir(config_file))
}

/// Loads `.env` and the raw configuration with environment overrides.
fn load_raw(config_path: Option<&PathBuf>) -> Result<(PathBuf, Option<RawDeployConfig>)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;
    let raw = parser.load_with_env(&config_file)?;
    Ok((config_file, raw))
}
