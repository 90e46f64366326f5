// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Release Deploy
//!
//! Versioned release deployments to a single remote host over SSH.
//!
//! ## Overview
//!
//! Every release lands in its own directory and is published by repointing
//! a `current` symlink, so the previous release stays on disk until the
//! retention policy removes it:
//!
//! ```text
//! <remote_directory>/
//!   releases/
//!     1.4.0/
//!     1.5.0/
//!   current -> <remote_directory>/releases/1.5.0
//! ```
//!
//! ## Architecture
//!
//! A deployment is assembled in a fixed order:
//!
//! 1. **Validation**: the raw YAML configuration becomes a [`DeploymentConfig`]
//! 2. **Paths**: the release version yields the remote paths
//! 3. **Graph**: a task graph is built from the configuration
//! 4. **Execution**: the graph runs through a [`RemoteTransport`]
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`planner`]: Paths, retention, task graph, and pipeline execution
//! - [`scheduler`]: Task registration and dependency ordering
//! - [`transport`]: SSH and dry-run remote channels
//! - [`deployment`]: Assembles a deployment from configuration
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! host: example.com
//! username: deploy
//! remote_directory: /srv/app
//! credential_file: ~/.ssh/id_rsa
//! source_files: dist
//! releases_to_keep: 5
//! group: www-data
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod deployment;
pub mod error;
pub mod files;
pub mod metadata;
pub mod planner;
pub mod scheduler;
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DeploymentConfig, RawDeployConfig};
pub use deployment::Deployment;
pub use error::{ConfigError, DeployError, Result};
pub use planner::{
    DeployGraph, DeployGraphBuilder, ExecutionResult, PipelineExecutor, ReleasePathResolver,
    ResolvedPaths, RetentionPlan, RetentionPlanner,
};
pub use scheduler::{TaskRegistry, TaskScheduler};
pub use transport::{DryRunTransport, RemoteTransport, SshTransport};
