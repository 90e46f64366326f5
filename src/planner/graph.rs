//! Deployment task graph construction.
//!
//! The graph always starts at `makeRemoteDirectories` and ends at
//! `release`. Optional stages are folded in a fixed order; each one that
//! is present depends on the stage added before it, so `release` always
//! reaches every included node through a single edge.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::config::DeploymentConfig;
use crate::error::PlanError;
use crate::scheduler::TaskScheduler;

use super::paths::ResolvedPaths;

/// Creates the release directory.
pub const MAKE_REMOTE_DIRECTORIES: &str = "makeRemoteDirectories";
/// Uploads the source files into the release directory.
pub const TRANSFER_DISTRIBUTION: &str = "transferDistribution";
/// Repoints the `current` symlink.
pub const CREATE_CURRENT_SYMLINK: &str = "createCurrentSymlink";
/// Prunes releases beyond the retention count.
pub const REMOVE_OLD_RELEASES: &str = "removeOldReleases";
/// Applies the configured group.
pub const SET_RELEASE_GROUP: &str = "setReleaseGroup";
/// Applies the configured permissions.
pub const SET_RELEASE_PERMISSIONS: &str = "setReleasePermissions";
/// Terminal synchronization point.
pub const RELEASE: &str = "release";

/// What a task does when it runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskAction {
    /// Run a batch of shell commands on the remote host, in order.
    Exec {
        /// The commands.
        commands: Vec<String>,
    },
    /// Copy local files into a remote directory.
    Upload {
        /// Local path, directory, or glob specs.
        sources: Vec<String>,
        /// Remote destination directory.
        destination: String,
    },
    /// List the release root, then delete releases beyond `keep`.
    ///
    /// The listing and the delete batch form one unit: nothing else runs
    /// between them.
    PruneReleases {
        /// Remote release root.
        release_root: String,
        /// Number of releases to keep.
        keep: u32,
    },
    /// Run a shell command on the local machine.
    Local {
        /// The command line.
        command: String,
    },
    /// No work; only orders its dependencies.
    Barrier,
}

/// One step of the deployment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskNode {
    /// Unique task name.
    pub name: String,
    /// Names this task depends on.
    pub depends_on: BTreeSet<String>,
    /// What the task does.
    pub action: TaskAction,
}

/// The deployment task graph, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployGraph {
    nodes: Vec<TaskNode>,
}

/// An optional stage between the symlink and `release`.
struct OptionalStage {
    name: &'static str,
    action: fn(&DeploymentConfig, &ResolvedPaths) -> Option<TaskAction>,
}

/// Optional stages in precedence order. Each present stage depends on the
/// nearest present stage above it, falling back to the symlink task.
const OPTIONAL_STAGES: &[OptionalStage] = &[
    OptionalStage {
        name: REMOVE_OLD_RELEASES,
        action: remove_old_releases,
    },
    OptionalStage {
        name: SET_RELEASE_GROUP,
        action: set_release_group,
    },
    OptionalStage {
        name: SET_RELEASE_PERMISSIONS,
        action: set_release_permissions,
    },
];

fn remove_old_releases(config: &DeploymentConfig, paths: &ResolvedPaths) -> Option<TaskAction> {
    config.retention().map(|keep| TaskAction::PruneReleases {
        release_root: paths.release_root_path.clone(),
        keep,
    })
}

fn set_release_group(config: &DeploymentConfig, paths: &ResolvedPaths) -> Option<TaskAction> {
    config.group.as_ref().map(|group| TaskAction::Exec {
        commands: vec![format!("chgrp -R {group} {}", paths.current_version_path)],
    })
}

fn set_release_permissions(config: &DeploymentConfig, paths: &ResolvedPaths) -> Option<TaskAction> {
    config.permissions.as_ref().map(|permissions| TaskAction::Exec {
        commands: vec![format!("chmod -R {permissions} {}", paths.current_version_path)],
    })
}

/// Builds the deployment graph from a validated configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeployGraphBuilder;

impl DeployGraphBuilder {
    /// Creates a new builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the graph. Cannot fail for a validated configuration.
    #[must_use]
    pub fn build(&self, config: &DeploymentConfig, paths: &ResolvedPaths) -> DeployGraph {
        let mut graph = DeployGraph { nodes: Vec::new() };

        graph.push(
            MAKE_REMOTE_DIRECTORIES,
            [],
            TaskAction::Exec {
                commands: vec![format!("mkdir -p {}", paths.current_version_path)],
            },
        );

        let mut transfer_deps = vec![MAKE_REMOTE_DIRECTORIES];
        if let Some(package_task) = &config.package_task {
            transfer_deps.push(package_task.as_str());
        }
        graph.push(
            TRANSFER_DISTRIBUTION,
            transfer_deps,
            TaskAction::Upload {
                sources: config.source_files.clone(),
                destination: paths.current_version_path.clone(),
            },
        );

        graph.push(
            CREATE_CURRENT_SYMLINK,
            [TRANSFER_DISTRIBUTION],
            TaskAction::Exec {
                commands: vec![
                    format!("rm -f {}", paths.current_symlink_path),
                    format!(
                        "ln -s {} {}",
                        paths.current_version_path, paths.current_symlink_path
                    ),
                ],
            },
        );

        let mut tail = CREATE_CURRENT_SYMLINK;
        for stage in OPTIONAL_STAGES {
            if let Some(action) = (stage.action)(config, paths) {
                graph.push(stage.name, [tail], action);
                tail = stage.name;
            }
        }

        graph.push(RELEASE, [tail], TaskAction::Barrier);

        debug!(
            "Built deployment graph with {} tasks (release <- {})",
            graph.nodes.len(),
            tail
        );
        graph
    }
}

impl DeployGraph {
    fn push<'a>(
        &mut self,
        name: &str,
        depends_on: impl IntoIterator<Item = &'a str>,
        action: TaskAction,
    ) {
        self.nodes.push(TaskNode {
            name: name.to_string(),
            depends_on: depends_on.into_iter().map(str::to_string).collect(),
            action,
        });
    }

    /// Returns the nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    /// Looks up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Returns true if a node with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    /// Returns the node names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Registers every node with a scheduler, one call per node.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler rejects a registration.
    pub fn register_with(&self, scheduler: &mut dyn TaskScheduler) -> Result<(), PlanError> {
        for node in &self.nodes {
            scheduler.register_task(
                &node.name,
                node.depends_on.iter().cloned().collect(),
                node.action.clone(),
            )?;
        }
        Ok(())
    }

    /// Returns a stable SHA-256 digest of nodes, edges, and actions.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for node in &self.nodes {
            hasher.update(node.name.as_bytes());
            for dep in &node.depends_on {
                hasher.update(b"<");
                hasher.update(dep.as_bytes());
            }
            hasher.update(node.action.to_string().as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

impl TaskAction {
    /// Returns the remote shell commands this action runs directly.
    ///
    /// Empty for uploads, local tasks, and barriers. The prune action
    /// reports only its listing command; its deletes depend on the listing.
    #[must_use]
    pub fn remote_commands(&self) -> Vec<String> {
        match self {
            Self::Exec { commands } => commands.clone(),
            Self::PruneReleases { release_root, .. } => vec![format!("ls {release_root}")],
            Self::Upload { .. } | Self::Local { .. } | Self::Barrier => Vec::new(),
        }
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exec { commands } => write!(f, "exec: {}", commands.join("; ")),
            Self::Upload {
                sources,
                destination,
            } => write!(f, "upload {} -> {destination}", sources.join(", ")),
            Self::PruneReleases { release_root, keep } => {
                write!(f, "prune {release_root} (keep {keep})")
            }
            Self::Local { command } => write!(f, "local: {command}"),
            Self::Barrier => write!(f, "-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ReleasePathResolver;
    use crate::scheduler::TaskRegistry;
    use std::path::PathBuf;

    fn config() -> DeploymentConfig {
        DeploymentConfig {
            host: String::from("example.com"),
            port: 22,
            username: String::from("deploy"),
            remote_directory: String::from("/srv/app"),
            credential_file: PathBuf::from("/keys/id_rsa"),
            source_files: vec![String::from("dist")],
            package_task: None,
            releases_to_keep: None,
            group: None,
            permissions: None,
            metadata_file: PathBuf::from("package.json"),
        }
    }

    fn build(config: &DeploymentConfig) -> DeployGraph {
        let paths = ReleasePathResolver::new().resolve(config, "2.1.0").unwrap();
        DeployGraphBuilder::new().build(config, &paths)
    }

    fn deps(graph: &DeployGraph, name: &str) -> Vec<String> {
        graph
            .node(name)
            .unwrap_or_else(|| panic!("missing node {name}"))
            .depends_on
            .iter()
            .cloned()
            .collect()
    }

    /// Every node other than `release` must be reachable from `release`.
    fn assert_release_reaches_all(graph: &DeployGraph) {
        let mut seen = BTreeSet::new();
        let mut stack = vec![RELEASE.to_string()];
        while let Some(name) = stack.pop() {
            if let Some(node) = graph.node(&name) {
                if seen.insert(name.clone()) {
                    stack.extend(node.depends_on.iter().cloned());
                }
            }
        }
        let all: BTreeSet<String> = graph.names().into_iter().map(str::to_string).collect();
        assert_eq!(seen, all);

        let sources: Vec<&str> = graph
            .nodes()
            .iter()
            .filter(|n| n.depends_on.is_empty())
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(sources, vec![MAKE_REMOTE_DIRECTORIES]);
    }

    #[test]
    fn test_minimal_graph() {
        let graph = build(&config());

        assert_eq!(
            graph.names(),
            vec![
                MAKE_REMOTE_DIRECTORIES,
                TRANSFER_DISTRIBUTION,
                CREATE_CURRENT_SYMLINK,
                RELEASE
            ]
        );
        assert_eq!(deps(&graph, RELEASE), vec![CREATE_CURRENT_SYMLINK]);
        assert_eq!(deps(&graph, TRANSFER_DISTRIBUTION), vec![MAKE_REMOTE_DIRECTORIES]);
        assert_release_reaches_all(&graph);
    }

    #[test]
    fn test_fixed_node_commands() {
        let graph = build(&config());

        assert_eq!(
            graph.node(MAKE_REMOTE_DIRECTORIES).unwrap().action.remote_commands(),
            vec!["mkdir -p /srv/app/releases/2.1.0"]
        );
        assert_eq!(
            graph.node(CREATE_CURRENT_SYMLINK).unwrap().action.remote_commands(),
            vec![
                "rm -f /srv/app/current",
                "ln -s /srv/app/releases/2.1.0 /srv/app/current"
            ]
        );
        assert_eq!(
            graph.node(TRANSFER_DISTRIBUTION).unwrap().action,
            TaskAction::Upload {
                sources: vec![String::from("dist")],
                destination: String::from("/srv/app/releases/2.1.0"),
            }
        );
        assert!(graph.node(RELEASE).unwrap().action.remote_commands().is_empty());
    }

    #[test]
    fn test_retention_only() {
        let mut config = config();
        config.releases_to_keep = Some(3);
        let graph = build(&config);

        assert_eq!(deps(&graph, REMOVE_OLD_RELEASES), vec![CREATE_CURRENT_SYMLINK]);
        assert_eq!(deps(&graph, RELEASE), vec![REMOVE_OLD_RELEASES]);
        assert_eq!(
            graph.node(REMOVE_OLD_RELEASES).unwrap().action,
            TaskAction::PruneReleases {
                release_root: String::from("/srv/app/releases"),
                keep: 3,
            }
        );
        assert_release_reaches_all(&graph);
    }

    #[test]
    fn test_zero_retention_disables_pruning() {
        let mut config = config();
        config.releases_to_keep = Some(0);
        assert!(!build(&config).contains(REMOVE_OLD_RELEASES));
    }

    #[test]
    fn test_group_and_permissions_chain() {
        let mut config = config();
        config.group = Some(String::from("www-data"));
        config.permissions = Some(String::from("ugo+rX"));
        let graph = build(&config);

        assert!(!graph.contains(REMOVE_OLD_RELEASES));
        assert_eq!(deps(&graph, SET_RELEASE_GROUP), vec![CREATE_CURRENT_SYMLINK]);
        assert_eq!(deps(&graph, SET_RELEASE_PERMISSIONS), vec![SET_RELEASE_GROUP]);
        assert_eq!(deps(&graph, RELEASE), vec![SET_RELEASE_PERMISSIONS]);
        assert_eq!(
            graph.node(SET_RELEASE_GROUP).unwrap().action.remote_commands(),
            vec!["chgrp -R www-data /srv/app/releases/2.1.0"]
        );
        assert_eq!(
            graph.node(SET_RELEASE_PERMISSIONS).unwrap().action.remote_commands(),
            vec!["chmod -R ugo+rX /srv/app/releases/2.1.0"]
        );
        assert_release_reaches_all(&graph);
    }

    #[test]
    fn test_permissions_after_retention_without_group() {
        let mut config = config();
        config.releases_to_keep = Some(2);
        config.permissions = Some(String::from("ugo+rX"));
        let graph = build(&config);

        assert_eq!(deps(&graph, SET_RELEASE_PERMISSIONS), vec![REMOVE_OLD_RELEASES]);
        assert_eq!(deps(&graph, RELEASE), vec![SET_RELEASE_PERMISSIONS]);
        assert_release_reaches_all(&graph);
    }

    #[test]
    fn test_group_only_after_retention() {
        let mut config = config();
        config.releases_to_keep = Some(2);
        config.group = Some(String::from("www-data"));
        let graph = build(&config);

        assert_eq!(deps(&graph, SET_RELEASE_GROUP), vec![REMOVE_OLD_RELEASES]);
        assert_eq!(deps(&graph, RELEASE), vec![SET_RELEASE_GROUP]);
        assert_release_reaches_all(&graph);
    }

    #[test]
    fn test_every_optional_subset_is_connected() {
        for mask in 0..8u8 {
            let mut config = config();
            if mask & 1 != 0 {
                config.releases_to_keep = Some(4);
            }
            if mask & 2 != 0 {
                config.group = Some(String::from("g"));
            }
            if mask & 4 != 0 {
                config.permissions = Some(String::from("u+rw"));
            }
            let graph = build(&config);
            assert_eq!(graph.len(), 4 + mask.count_ones() as usize);
            assert_eq!(deps(&graph, RELEASE).len(), 1);
            assert_release_reaches_all(&graph);
        }
    }

    #[test]
    fn test_package_task_dependency() {
        let mut config = config();
        config.package_task = Some(String::from("package"));
        let graph = build(&config);

        assert_eq!(
            deps(&graph, TRANSFER_DISTRIBUTION),
            vec![MAKE_REMOTE_DIRECTORIES, "package"]
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut config = config();
        config.releases_to_keep = Some(3);
        config.group = Some(String::from("www-data"));

        let first = build(&config);
        let second = build(&config);
        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());

        config.permissions = Some(String::from("ugo+rX"));
        assert_ne!(first.fingerprint(), build(&config).fingerprint());
    }

    #[test]
    fn test_register_with_scheduler() {
        let mut config = config();
        config.releases_to_keep = Some(3);
        let graph = build(&config);

        let mut registry = TaskRegistry::new();
        graph.register_with(&mut registry).unwrap();

        assert_eq!(registry.len(), graph.len());
        let order: Vec<String> = registry
            .execution_order(RELEASE)
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(
            order,
            vec![
                MAKE_REMOTE_DIRECTORIES,
                TRANSFER_DISTRIBUTION,
                CREATE_CURRENT_SYMLINK,
                REMOVE_OLD_RELEASES,
                RELEASE
            ]
        );

        let err = graph.register_with(&mut registry).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateTask { .. }));
    }
}
