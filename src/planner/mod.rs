//! Planning module for release deployments.
//!
//! This module resolves remote paths, builds the conditional task graph,
//! plans release retention, and executes the resulting pipeline.

mod paths;
mod retention;
mod graph;
mod executor;

pub use paths::{ReleasePathResolver, ResolvedPaths};
pub use retention::{RetentionPlan, RetentionPlanner};
pub use graph::{
    CREATE_CURRENT_SYMLINK, DeployGraph, DeployGraphBuilder, MAKE_REMOTE_DIRECTORIES, RELEASE,
    REMOVE_OLD_RELEASES, SET_RELEASE_GROUP, SET_RELEASE_PERMISSIONS, TRANSFER_DISTRIBUTION,
    TaskAction, TaskNode,
};
pub use executor::{ExecutionResult, PipelineExecutor, ReleaseLog, TaskResult, TaskStatus};
