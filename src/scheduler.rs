//! Task scheduling.
//!
//! The deployment graph is handed to a scheduler as plain
//! `(name, dependencies, action)` registrations. [`TaskRegistry`] is the
//! in-process scheduler: it stores registrations and resolves the
//! dependency-ordered list of tasks needed to run a target.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::error::PlanError;
use crate::planner::TaskAction;

/// Collaborator interface for a task scheduler.
pub trait TaskScheduler {
    /// Registers a named task with its dependencies and action.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already registered.
    fn register_task(
        &mut self,
        name: &str,
        dependencies: Vec<String>,
        action: TaskAction,
    ) -> Result<(), PlanError>;

    /// Returns true if a task with this name is registered.
    fn has_task(&self, name: &str) -> bool;
}

/// A task stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredTask {
    /// Task name.
    pub name: String,
    /// Names this task depends on, in declaration order.
    pub dependencies: Vec<String>,
    /// What the task does.
    pub action: TaskAction,
}

/// In-process task scheduler.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, RegisteredTask>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Registers every entry of a local task map as a local shell task.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is already registered.
    pub fn register_local_tasks(&mut self, tasks: &BTreeMap<String, String>) -> Result<(), PlanError> {
        for (name, command) in tasks {
            self.register_task(
                name,
                Vec::new(),
                TaskAction::Local {
                    command: command.clone(),
                },
            )?;
        }
        Ok(())
    }

    /// Looks up a task by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredTask> {
        self.tasks.get(name)
    }

    /// Returns all registered tasks, ordered by name.
    pub fn tasks(&self) -> impl Iterator<Item = &RegisteredTask> {
        self.tasks.values()
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolves the tasks needed to run `target`, dependencies first.
    ///
    /// Each task appears once. Dependencies are visited in declaration
    /// order, so the result is deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if the target or a dependency is unknown, or if
    /// the dependencies form a cycle.
    pub fn execution_order(&self, target: &str) -> Result<Vec<&RegisteredTask>, PlanError> {
        if !self.has_task(target) {
            return Err(PlanError::UnknownTask {
                name: target.to_string(),
            });
        }

        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut stack = Vec::new();
        self.visit(target, &mut stack, &mut done, &mut order)?;

        debug!(
            "Resolved {} task(s) for '{}': {}",
            order.len(),
            target,
            order.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(" -> ")
        );
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<&'a RegisteredTask>,
    ) -> Result<(), PlanError> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut cycle: Vec<&str> = stack[pos..].iter().map(String::as_str).collect();
            cycle.push(name);
            return Err(PlanError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }

        let task = self.tasks.get(name).ok_or_else(|| PlanError::UnknownTask {
            name: name.to_string(),
        })?;

        stack.push(name.to_string());
        for dependency in &task.dependencies {
            if !self.has_task(dependency) {
                return Err(PlanError::UnknownDependency {
                    task: name.to_string(),
                    dependency: dependency.clone(),
                });
            }
            self.visit(dependency, stack, done, order)?;
        }
        stack.pop();

        done.insert(name.to_string());
        order.push(task);
        Ok(())
    }

    /// Returns the names of tasks nothing else depends on.
    #[must_use]
    pub fn sinks(&self) -> BTreeSet<&str> {
        let depended_on: HashSet<&str> = self
            .tasks
            .values()
            .flat_map(|t| t.dependencies.iter().map(String::as_str))
            .collect();
        self.tasks
            .keys()
            .map(String::as_str)
            .filter(|name| !depended_on.contains(name))
            .collect()
    }
}

impl TaskScheduler for TaskRegistry {
    fn register_task(
        &mut self,
        name: &str,
        dependencies: Vec<String>,
        action: TaskAction,
    ) -> Result<(), PlanError> {
        if self.tasks.contains_key(name) {
            return Err(PlanError::DuplicateTask {
                name: name.to_string(),
            });
        }
        debug!("Registering task '{}' (deps: {:?})", name, dependencies);
        self.tasks.insert(
            name.to_string(),
            RegisteredTask {
                name: name.to_string(),
                dependencies,
                action,
            },
        );
        Ok(())
    }

    fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TaskAction {
        TaskAction::Barrier
    }

    fn names(order: &[&RegisteredTask]) -> Vec<String> {
        order.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = TaskRegistry::new();
        registry.register_task("a", vec![], noop()).unwrap();
        let err = registry.register_task("a", vec![], noop()).unwrap_err();
        assert_eq!(err, PlanError::DuplicateTask { name: String::from("a") });
    }

    #[test]
    fn test_execution_order_dependencies_first() {
        let mut registry = TaskRegistry::new();
        registry.register_task("a", vec![], noop()).unwrap();
        registry.register_task("b", vec![String::from("a")], noop()).unwrap();
        registry
            .register_task("c", vec![String::from("b"), String::from("a")], noop())
            .unwrap();

        let order = registry.execution_order("c").unwrap();
        assert_eq!(names(&order), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unrelated_tasks_not_scheduled() {
        let mut registry = TaskRegistry::new();
        registry.register_task("a", vec![], noop()).unwrap();
        registry.register_task("lint", vec![], noop()).unwrap();
        registry.register_task("b", vec![String::from("a")], noop()).unwrap();

        let order = registry.execution_order("b").unwrap();
        assert_eq!(names(&order), vec!["a", "b"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut registry = TaskRegistry::new();
        registry.register_task("a", vec![String::from("b")], noop()).unwrap();
        registry.register_task("b", vec![String::from("a")], noop()).unwrap();

        let err = registry.execution_order("a").unwrap_err();
        assert!(matches!(err, PlanError::CircularDependency { .. }));
    }

    #[test]
    fn test_unknown_dependency() {
        let mut registry = TaskRegistry::new();
        registry.register_task("a", vec![String::from("ghost")], noop()).unwrap();

        let err = registry.execution_order("a").unwrap_err();
        assert_eq!(
            err,
            PlanError::UnknownDependency {
                task: String::from("a"),
                dependency: String::from("ghost"),
            }
        );
        assert!(matches!(
            registry.execution_order("missing"),
            Err(PlanError::UnknownTask { .. })
        ));
    }

    #[test]
    fn test_local_tasks_registered() {
        let mut tasks = BTreeMap::new();
        tasks.insert(String::from("package"), String::from("make dist"));

        let mut registry = TaskRegistry::new();
        registry.register_local_tasks(&tasks).unwrap();

        assert!(registry.has_task("package"));
        assert_eq!(
            registry.get("package").unwrap().action,
            TaskAction::Local {
                command: String::from("make dist")
            }
        );
    }
}
