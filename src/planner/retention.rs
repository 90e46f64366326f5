//! Release retention planning.
//!
//! The remote listing is produced by `ls <release root>`, which returns
//! entries oldest first and ends with a newline. The element after that
//! final newline is an artifact of line splitting and is always dropped,
//! even when it is not empty.

use serde::Serialize;

/// The releases to delete for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    /// Release root the directory names are relative to.
    pub release_root_path: String,
    /// Directory names found remotely, in listing order.
    pub existing_directories: Vec<String>,
    /// Number of releases to keep.
    pub keep_count: u32,
    /// Oldest directories beyond the retention count, in listing order.
    pub directories_to_delete: Vec<String>,
}

/// Computes which release directories to delete.
#[derive(Debug, Clone)]
pub struct RetentionPlanner {
    release_root_path: String,
}

impl RetentionPlanner {
    /// Creates a planner for the given release root.
    #[must_use]
    pub fn new(release_root_path: impl Into<String>) -> Self {
        Self {
            release_root_path: release_root_path.into(),
        }
    }

    /// Returns the remote command that lists existing releases.
    #[must_use]
    pub fn listing_command(&self) -> String {
        format!("ls {}", self.release_root_path)
    }

    /// Plans deletions from raw listing output.
    #[must_use]
    pub fn plan(&self, listing_output: &str, keep_count: u32) -> RetentionPlan {
        let mut existing: Vec<String> = listing_output.split('\n').map(str::to_string).collect();
        existing.pop();

        let keep = usize::try_from(keep_count).unwrap_or(usize::MAX);
        let delete_count = existing.len().saturating_sub(keep);
        let directories_to_delete = existing[..delete_count].to_vec();

        RetentionPlan {
            release_root_path: self.release_root_path.clone(),
            existing_directories: existing,
            keep_count,
            directories_to_delete,
        }
    }
}

impl RetentionPlan {
    /// Returns true if nothing needs deleting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories_to_delete.is_empty()
    }

    /// Returns the batched delete commands, one per directory.
    #[must_use]
    pub fn delete_commands(&self) -> Vec<String> {
        self.directories_to_delete
            .iter()
            .map(|name| format!("rm -rf {}/{name}", self.release_root_path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> RetentionPlanner {
        RetentionPlanner::new("/srv/app/releases")
    }

    #[test]
    fn test_deletes_oldest_prefix() {
        let plan = planner().plan("a\nb\nc\nd\n", 2);
        assert_eq!(plan.existing_directories, vec!["a", "b", "c", "d"]);
        assert_eq!(plan.directories_to_delete, vec!["a", "b"]);
        assert_eq!(
            plan.delete_commands(),
            vec!["rm -rf /srv/app/releases/a", "rm -rf /srv/app/releases/b"]
        );
    }

    #[test]
    fn test_keep_count_covers_everything() {
        assert!(planner().plan("a\nb\n", 2).is_empty());
        assert!(planner().plan("a\nb\n", 5).is_empty());
        assert!(planner().plan("", 1).is_empty());
    }

    #[test]
    fn test_only_last_element_dropped() {
        let plan = planner().plan("a\n\nb\nc\n", 1);
        assert_eq!(plan.existing_directories, vec!["a", "", "b", "c"]);
        assert_eq!(plan.directories_to_delete, vec!["a", "", "b"]);
    }

    #[test]
    fn test_last_element_dropped_without_trailing_newline() {
        let plan = planner().plan("1.0.0\n1.1.0\n1.2.0", 1);
        assert_eq!(plan.existing_directories, vec!["1.0.0", "1.1.0"]);
        assert_eq!(plan.directories_to_delete, vec!["1.0.0"]);
    }

    #[test]
    fn test_delete_count_invariant() {
        let listing = "r1\nr2\nr3\nr4\nr5\nr6\n";
        for keep in 1..=8u32 {
            let plan = planner().plan(listing, keep);
            let expected = 6usize.saturating_sub(keep as usize);
            assert_eq!(plan.directories_to_delete.len(), expected);
            assert_eq!(
                plan.directories_to_delete[..],
                plan.existing_directories[..expected]
            );
        }
    }

    #[test]
    fn test_listing_command() {
        assert_eq!(planner().listing_command(), "ls /srv/app/releases");
    }
}
