//! Deployment assembly.
//!
//! Ties the pieces together in their fixed order: local tasks are
//! registered, the configuration is validated against them, the version
//! is resolved, paths are derived, and the graph is built and handed to
//! the scheduler. Every configuration error surfaces here, before any
//! remote side effect.

use tracing::info;

use crate::config::{ConfigValidator, DeploymentConfig, RawDeployConfig};
use crate::error::Result;
use crate::metadata;
use crate::planner::{DeployGraph, DeployGraphBuilder, ReleasePathResolver, ResolvedPaths};
use crate::scheduler::TaskRegistry;

/// A fully assembled deployment, ready to run.
#[derive(Debug)]
pub struct Deployment {
    /// Validated configuration.
    pub config: DeploymentConfig,
    /// Release version being deployed.
    pub version: String,
    /// Remote paths for this release.
    pub paths: ResolvedPaths,
    /// The deployment task graph.
    pub graph: DeployGraph,
    /// Scheduler holding local tasks and the graph.
    pub registry: TaskRegistry,
}

impl Deployment {
    /// Assembles a deployment from a raw configuration.
    ///
    /// The version is `version_override` when given, otherwise the
    /// `version` field of the configured metadata file.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the version cannot be
    /// resolved, or a task name collides with a pipeline task.
    pub fn prepare(
        raw: Option<&RawDeployConfig>,
        validator: &ConfigValidator,
        version_override: Option<&str>,
    ) -> Result<Self> {
        let mut registry = TaskRegistry::new();
        if let Some(raw) = raw {
            registry.register_local_tasks(&raw.tasks)?;
        }

        let config = validator.validate(raw, &registry)?;

        let version = match version_override {
            Some(version) => version.trim().to_string(),
            None => metadata::read_version(&config.metadata_file)?,
        };
        let paths = ReleasePathResolver::new().resolve(&config, &version)?;

        let graph = DeployGraphBuilder::new().build(&config, &paths);
        graph.register_with(&mut registry)?;

        info!(
            "Prepared release {} for {}:{} ({} tasks)",
            version,
            config.destination(),
            paths.current_version_path,
            graph.len()
        );

        Ok(Self {
            config,
            version,
            paths,
            graph,
            registry,
        })
    }
}
