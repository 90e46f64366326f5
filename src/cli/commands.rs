//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::planner::RELEASE;

/// release-deploy - versioned release deployments over SSH.
#[derive(Parser, Debug)]
#[command(name = "release-deploy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "RELEASE_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Release version to deploy instead of the metadata file's version.
    #[arg(long, global = true)]
    pub release_version: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a template configuration file.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the deployment configuration.
    Validate,

    /// Show the deployment task graph.
    Plan,

    /// List every registered task and its dependencies.
    Tasks,

    /// Run a task and everything it depends on.
    Run {
        /// Task to run.
        #[arg(default_value = RELEASE)]
        task: String,

        /// Log commands instead of executing them remotely.
        #[arg(long)]
        dry_run: bool,

        /// Directory for the release log.
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,

        /// Do not write a release log.
        #[arg(long)]
        no_log: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults_to_release() {
        let cli = Cli::try_parse_from(["release-deploy", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                task,
                dry_run,
                no_log,
                ..
            } => {
                assert_eq!(task, "release");
                assert!(!dry_run);
                assert!(!no_log);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_release_version() {
        let cli = Cli::try_parse_from([
            "release-deploy",
            "plan",
            "--release-version",
            "2.1.0",
            "--output",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.release_version.as_deref(), Some("2.1.0"));
        assert!(matches!(cli.output, OutputFormat::Json));
    }
}
