//! Pipeline executor for deployment task graphs.
//!
//! Tasks run one at a time in the order the scheduler resolves. The first
//! failure stops the run and every remaining task is reported as skipped;
//! there is no partial success.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, Result, TransportError};
use crate::files;
use crate::scheduler::{RegisteredTask, TaskRegistry};
use crate::transport::{CommandOutput, RemoteTransport};

use super::graph::TaskAction;
use super::retention::{RetentionPlan, RetentionPlanner};

/// Executor for deployment task graphs.
pub struct PipelineExecutor<'a> {
    /// Remote exec/copy channel.
    transport: &'a dyn RemoteTransport,
    /// Where remote batches and their output are appended, if anywhere.
    release_log: Option<ReleaseLog>,
}

/// Outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// The task ran and succeeded.
    Succeeded,
    /// The task ran and failed.
    Failed,
    /// The task did not run because an earlier task failed.
    Skipped,
}

/// Result of executing a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task name.
    pub name: String,
    /// Outcome.
    pub status: TaskStatus,
    /// Error message (if failed).
    pub error: Option<String>,
    /// Retention plan computed by a prune task.
    pub retention: Option<RetentionPlan>,
}

/// Result of executing the whole pipeline.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Individual task results, in execution order.
    pub results: Vec<TaskResult>,
    /// Number of successful tasks.
    pub successful: usize,
    /// Number of failed tasks.
    pub failed: usize,
    /// Number of skipped tasks.
    pub skipped: usize,
    /// Whether every task succeeded.
    pub success: bool,
}

/// Append-only log of remote batches for one deployment.
#[derive(Debug, Clone)]
pub struct ReleaseLog {
    path: PathBuf,
}

impl ReleaseLog {
    /// Creates a log named `release-<UTC timestamp>.log` under `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ");
        Self {
            path: dir.as_ref().join(format!("release-{stamp}.log")),
        }
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, task: &str, commands: &[String], output: &CommandOutput) {
        if let Err(e) = self.try_append(task, commands, output) {
            warn!("Failed to write release log {}: {}", self.path.display(), e);
        }
    }

    fn try_append(
        &self,
        task: &str,
        commands: &[String],
        output: &CommandOutput,
    ) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "[{}] {task}", Utc::now().to_rfc3339())?;
        for command in commands {
            writeln!(file, "$ {command}")?;
        }
        if !output.stdout.is_empty() {
            write!(file, "{}", output.stdout)?;
        }
        if !output.stderr.is_empty() {
            write!(file, "{}", output.stderr)?;
        }
        Ok(())
    }
}

impl<'a> PipelineExecutor<'a> {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(transport: &'a dyn RemoteTransport) -> Self {
        Self {
            transport,
            release_log: None,
        }
    }

    /// Appends every remote batch and its output to `log`.
    #[must_use]
    pub fn with_release_log(mut self, log: ReleaseLog) -> Self {
        self.release_log = Some(log);
        self
    }

    /// Runs `target` and everything it depends on.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be scheduled. Task failures
    /// are reported in the [`ExecutionResult`], not as errors.
    pub async fn run(&self, registry: &TaskRegistry, target: &str) -> Result<ExecutionResult> {
        let order = registry.execution_order(target)?;
        info!(
            "Running '{}' ({} tasks) via {} transport",
            target,
            order.len(),
            self.transport.name()
        );

        let mut results = Vec::with_capacity(order.len());
        let mut halted = false;

        for task in order {
            if halted {
                warn!("Skipping task '{}' due to earlier failure", task.name);
                results.push(TaskResult {
                    name: task.name.clone(),
                    status: TaskStatus::Skipped,
                    error: None,
                    retention: None,
                });
                continue;
            }

            info!("Running task '{}': {}", task.name, task.action);
            match self.execute_task(task).await {
                Ok(retention) => results.push(TaskResult {
                    name: task.name.clone(),
                    status: TaskStatus::Succeeded,
                    error: None,
                    retention,
                }),
                Err(e) => {
                    error!("Task '{}' failed: {}", task.name, e);
                    halted = true;
                    results.push(TaskResult {
                        name: task.name.clone(),
                        status: TaskStatus::Failed,
                        error: Some(e.to_string()),
                        retention: None,
                    });
                }
            }
        }

        Ok(ExecutionResult::from_results(results))
    }

    /// Executes a single task.
    async fn execute_task(&self, task: &RegisteredTask) -> Result<Option<RetentionPlan>> {
        match &task.action {
            TaskAction::Exec { commands } => {
                self.remote_batch(&task.name, commands).await?;
                Ok(None)
            }
            TaskAction::Upload {
                sources,
                destination,
            } => {
                let files = files::find_all(sources)?;
                if files.is_empty() {
                    return Err(ConfigError::NoSourceFiles {
                        specs: sources.join(", "),
                    }
                    .into());
                }
                info!("Uploading {} file(s) to {}", files.len(), destination);
                self.transport.copy(&files, destination).await?;
                Ok(None)
            }
            TaskAction::PruneReleases { release_root, keep } => {
                self.prune(&task.name, release_root, *keep).await.map(Some)
            }
            TaskAction::Local { command } => {
                Self::run_local(command).await?;
                Ok(None)
            }
            TaskAction::Barrier => Ok(None),
        }
    }

    /// Lists the release root, plans, then deletes in one batch.
    ///
    /// The delete batch is only issued after the listing has returned.
    async fn prune(&self, task: &str, release_root: &str, keep: u32) -> Result<RetentionPlan> {
        let planner = RetentionPlanner::new(release_root);
        let listing = self.remote_batch(task, &[planner.listing_command()]).await?;
        let plan = planner.plan(&listing.stdout, keep);

        if plan.directories_to_delete.iter().any(String::is_empty) {
            warn!("Listing of {} contained blank entries; not deleting them", release_root);
        }
        let commands: Vec<String> = plan
            .directories_to_delete
            .iter()
            .zip(plan.delete_commands())
            .filter(|(name, _)| !name.is_empty())
            .map(|(_, command)| command)
            .collect();

        if commands.is_empty() {
            info!(
                "{} release(s) present, keeping {}; nothing to remove",
                plan.existing_directories.len(),
                keep
            );
        } else {
            info!("Removing {} old release(s)", commands.len());
            self.remote_batch(task, &commands).await?;
        }
        Ok(plan)
    }

    async fn remote_batch(&self, task: &str, commands: &[String]) -> Result<CommandOutput> {
        let output = self.transport.execute(commands).await?;
        if let Some(log) = &self.release_log {
            log.append(task, commands, &output);
        }
        Ok(output)
    }

    async fn run_local(command: &str) -> Result<()> {
        debug!("Running local command: {}", command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|source| TransportError::SpawnFailed {
                program: String::from("sh"),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(TransportError::CommandFailed {
                command: command.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into())
        }
    }
}

impl fmt::Debug for PipelineExecutor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("transport", &self.transport.name())
            .field("release_log", &self.release_log)
            .finish()
    }
}

impl ExecutionResult {
    pub(crate) fn from_results(results: Vec<TaskResult>) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        let successful = count(TaskStatus::Succeeded);
        let failed = count(TaskStatus::Failed);
        let skipped = count(TaskStatus::Skipped);
        Self {
            successful,
            failed,
            skipped,
            success: failed == 0 && skipped == 0,
            results,
        }
    }

    /// Returns the result of the named task, if it was scheduled.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Executed {} tasks: {} successful, {} failed, {} skipped",
            self.results.len(),
            self.successful,
            self.failed,
            self.skipped
        )
    }
}
