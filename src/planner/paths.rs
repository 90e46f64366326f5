//! Remote release paths.

use serde::Serialize;

use crate::config::DeploymentConfig;
use crate::error::ConfigError;

/// The three canonical remote paths of a release.
///
/// Paths are joined with `/` as-is: a trailing slash on the configured
/// remote directory is not normalized away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPaths {
    /// `<remote_directory>/releases`
    pub release_root_path: String,
    /// `<release_root_path>/<version>`
    pub current_version_path: String,
    /// `<remote_directory>/current`
    pub current_symlink_path: String,
}

/// Derives [`ResolvedPaths`] from a configuration and a version string.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReleasePathResolver;

impl ReleasePathResolver {
    /// Creates a new resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves the release paths for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVersion`] if `version` is empty.
    pub fn resolve(
        &self,
        config: &DeploymentConfig,
        version: &str,
    ) -> Result<ResolvedPaths, ConfigError> {
        if version.is_empty() {
            return Err(ConfigError::MissingVersion);
        }

        let release_root_path = format!("{}/releases", config.remote_directory);
        let current_version_path = format!("{release_root_path}/{version}");
        let current_symlink_path = format!("{}/current", config.remote_directory);

        Ok(ResolvedPaths {
            release_root_path,
            current_version_path,
            current_symlink_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(remote_directory: &str) -> DeploymentConfig {
        DeploymentConfig {
            host: String::from("example.com"),
            port: 22,
            username: String::from("deploy"),
            remote_directory: remote_directory.to_string(),
            credential_file: PathBuf::from("/keys/id_rsa"),
            source_files: vec![String::from(".")],
            package_task: None,
            releases_to_keep: None,
            group: None,
            permissions: None,
            metadata_file: PathBuf::from("package.json"),
        }
    }

    #[test]
    fn test_resolve_paths() {
        let paths = ReleasePathResolver::new()
            .resolve(&config("/srv/app"), "2.1.0")
            .unwrap();

        assert_eq!(paths.release_root_path, "/srv/app/releases");
        assert_eq!(paths.current_version_path, "/srv/app/releases/2.1.0");
        assert_eq!(paths.current_symlink_path, "/srv/app/current");
    }

    #[test]
    fn test_trailing_slash_not_normalized() {
        let paths = ReleasePathResolver::new()
            .resolve(&config("/srv/app/"), "1.0.0")
            .unwrap();
        assert_eq!(paths.release_root_path, "/srv/app//releases");
    }

    #[test]
    fn test_empty_version() {
        let result = ReleasePathResolver::new().resolve(&config("/srv/app"), "");
        assert_eq!(result, Err(ConfigError::MissingVersion));
    }
}
