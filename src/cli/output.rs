//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::deployment::Deployment;
use crate::planner::{ExecutionResult, TaskAction, TaskStatus};
use crate::scheduler::TaskRegistry;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Task row for table display.
#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Task")]
    name: String,
    #[tabled(rename = "Depends on")]
    depends_on: String,
    #[tabled(rename = "Action")]
    action: String,
}

/// Task result row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Task")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a deployment's task graph for display.
    #[must_use]
    pub fn format_plan(&self, deployment: &Deployment) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(deployment)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(deployment),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(deployment: &Deployment) -> String {
        let graph = &deployment.graph;
        let fingerprint = graph.fingerprint();
        let mut output = String::new();

        let _ = write!(
            output,
            "\nRelease {} -> {}:{}\n",
            deployment.version.bold(),
            deployment.config.destination(),
            deployment.paths.current_version_path
        );
        let _ = write!(output, "   Graph fingerprint: {}\n\n", &fingerprint[..12]);

        let rows: Vec<TaskRow> = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| TaskRow {
                index: i + 1,
                name: node.name.clone(),
                depends_on: join_or_dash(node.depends_on.iter().map(String::as_str)),
                action: Self::format_action(&node.action, 60),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} tasks, current -> {}\n",
            graph.len().to_string().green(),
            deployment.paths.current_symlink_path
        );
        output
    }

    /// Formats every registered task, local ones included.
    #[must_use]
    pub fn format_tasks(&self, registry: &TaskRegistry) -> String {
        match self.format {
            OutputFormat::Json => {
                let tasks: Vec<TaskJson> = registry
                    .tasks()
                    .map(|t| TaskJson {
                        name: t.name.clone(),
                        depends_on: t.dependencies.clone(),
                        action: t.action.clone(),
                    })
                    .collect();
                serde_json::to_string_pretty(&tasks).unwrap_or_default()
            }
            OutputFormat::Text => {
                let rows: Vec<TaskRow> = registry
                    .tasks()
                    .enumerate()
                    .map(|(i, t)| TaskRow {
                        index: i + 1,
                        name: t.name.clone(),
                        depends_on: join_or_dash(t.dependencies.iter().map(String::as_str)),
                        action: Self::format_action(&t.action, 60),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let sinks = registry.sinks();
                let _ = write!(
                    output,
                    "\n\nEntry points: {}\n",
                    join_or_dash(sinks.iter().copied())
                );
                output
            }
        }
    }

    /// Formats the result of a pipeline run.
    #[must_use]
    pub fn format_execution(&self, result: &ExecutionResult) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ExecutionJson::from(result)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let status = if result.success {
                    format!("{} Release complete", "✓".green())
                } else {
                    format!("{} Release failed", "✗".red())
                };
                let mut output = format!("{status}\n\n");

                let rows: Vec<ResultRow> = result
                    .results
                    .iter()
                    .map(|r| ResultRow {
                        name: r.name.clone(),
                        status: Self::format_status(r.status),
                        detail: r.error.clone().unwrap_or_else(|| {
                            r.retention.as_ref().map_or_else(String::new, |plan| {
                                format!(
                                    "kept {}, removed {}",
                                    plan.existing_directories.len()
                                        - plan.directories_to_delete.len(),
                                    plan.directories_to_delete.len()
                                )
                            })
                        }),
                    })
                    .collect();

                output.push_str(&Table::new(rows).to_string());
                let _ = write!(output, "\n\n{result}\n");
                output
            }
        }
    }

    /// Formats a task action, truncated to `max_len` characters before its
    /// kind is colored.
    fn format_action(action: &TaskAction, max_len: usize) -> String {
        let text = Self::truncate(&action.to_string(), max_len);
        match action {
            TaskAction::Exec { .. } => text,
            TaskAction::Upload { .. } => text.cyan().to_string(),
            TaskAction::PruneReleases { .. } => text.yellow().to_string(),
            TaskAction::Local { .. } => text.blue().to_string(),
            TaskAction::Barrier => text.dimmed().to_string(),
        }
    }

    /// Formats a task status with color.
    fn format_status(status: TaskStatus) -> String {
        match status {
            TaskStatus::Succeeded => status.to_string().green().to_string(),
            TaskStatus::Failed => status.to_string().red().to_string(),
            TaskStatus::Skipped => status.to_string().dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow(), message)
    }

    fn message(&self, status: &str, symbol: &colored::ColoredString, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

fn join_or_dash<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        String::from("-")
    } else {
        joined
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson<'a> {
    version: &'a str,
    destination: String,
    paths: &'a crate::planner::ResolvedPaths,
    fingerprint: String,
    tasks: &'a [crate::planner::TaskNode],
}

impl<'a> From<&'a Deployment> for PlanJson<'a> {
    fn from(deployment: &'a Deployment) -> Self {
        Self {
            version: &deployment.version,
            destination: deployment.config.destination(),
            paths: &deployment.paths,
            fingerprint: deployment.graph.fingerprint(),
            tasks: deployment.graph.nodes(),
        }
    }
}

#[derive(serde::Serialize)]
struct TaskJson {
    name: String,
    depends_on: Vec<String>,
    action: TaskAction,
}

#[derive(serde::Serialize)]
struct ExecutionJson {
    success: bool,
    successful: usize,
    failed: usize,
    skipped: usize,
    tasks: Vec<TaskResultJson>,
}

#[derive(serde::Serialize)]
struct TaskResultJson {
    name: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed_releases: Option<Vec<String>>,
}

impl From<&ExecutionResult> for ExecutionJson {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            success: result.success,
            successful: result.successful,
            failed: result.failed,
            skipped: result.skipped,
            tasks: result
                .results
                .iter()
                .map(|r| TaskResultJson {
                    name: r.name.clone(),
                    status: r.status.to_string(),
                    error: r.error.clone(),
                    removed_releases: r
                        .retention
                        .as_ref()
                        .map(|plan| plan.directories_to_delete.clone()),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{RetentionPlanner, TaskResult};

    fn result() -> ExecutionResult {
        let plan = RetentionPlanner::new("/srv/app/releases").plan("a\nb\nc\n", 1);
        ExecutionResult::from_results(vec![
            TaskResult {
                name: String::from("removeOldReleases"),
                status: TaskStatus::Succeeded,
                error: None,
                retention: Some(plan),
            },
            TaskResult {
                name: String::from("setReleaseGroup"),
                status: TaskStatus::Failed,
                error: Some(String::from("chgrp: invalid group")),
                retention: None,
            },
        ])
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghij", 6), "abc...");
    }

    #[test]
    fn test_long_colored_action_keeps_reset() {
        colored::control::set_override(true);
        let action = TaskAction::Upload {
            sources: vec![String::from("dist/very/long/path/to/artifacts/*.deb"); 3],
            destination: String::from("/srv/app/releases/2.1.0"),
        };

        let formatted = OutputFormatter::format_action(&action, 40);

        assert!(formatted.ends_with("\u{1b}[0m"), "{formatted:?}");
        let plain = formatted
            .trim_start_matches("\u{1b}[36m")
            .trim_end_matches("\u{1b}[0m");
        assert_eq!(plain.chars().count(), 40);
        assert!(plain.ends_with("..."));
    }

    #[test]
    fn test_execution_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_execution(&result())).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["tasks"][0]["removed_releases"][0], "a");
        assert_eq!(json["tasks"][1]["error"], "chgrp: invalid group");
    }

    #[test]
    fn test_execution_text_mentions_failure() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_execution(&result());
        assert!(text.contains("Release failed"));
        assert!(text.contains("kept 1, removed 2"));
    }

    #[test]
    fn test_json_message() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.warning("no files")).unwrap();
        assert_eq!(json["status"], "warning");
    }
}
