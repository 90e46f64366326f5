//! Configuration validation for release deployments.
//!
//! Rules run in a fixed order and the first failure wins, so a
//! configuration missing several fields always reports the same error.
//! Relative local paths resolve against the configuration file's directory
//! when one is set, so the result does not depend on the working directory.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;
use crate::scheduler::TaskScheduler;

use super::spec::{
    DEFAULT_METADATA_FILE, DEFAULT_PORT, DEFAULT_SOURCE, DeploymentConfig, RawDeployConfig,
};

/// Validator for deployment configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Home directory used to expand a leading `~`.
    home_dir: Option<PathBuf>,
    /// Directory relative local paths resolve against.
    base_dir: Option<PathBuf>,
}

impl ConfigValidator {
    /// Creates a validator that expands `~` to the invoking user's home.
    #[must_use]
    pub fn new() -> Self {
        Self {
            home_dir: dirs::home_dir(),
            base_dir: None,
        }
    }

    /// Overrides the home directory used for `~` expansion.
    #[must_use]
    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    /// Resolves relative `source_files`, `metadata_file` and
    /// `credential_file` against `dir`, usually the configuration file's
    /// directory. An empty path leaves them relative to the working directory.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.base_dir = (!dir.as_os_str().is_empty()).then_some(dir);
        self
    }

    /// Validates a raw configuration and applies defaults.
    ///
    /// `scheduler` is queried (read-only) to check that a configured
    /// package task is registered.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(
        &self,
        raw: Option<&RawDeployConfig>,
        scheduler: &dyn TaskScheduler,
    ) -> Result<DeploymentConfig, ConfigError> {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(ConfigError::MissingConfig),
        };

        let host = required(raw.host.as_ref()).ok_or(ConfigError::MissingHost)?;
        let remote_directory =
            required(raw.remote_directory.as_ref()).ok_or(ConfigError::MissingRemoteDirectory)?;
        let username = required(raw.username.as_ref()).ok_or(ConfigError::MissingUsername)?;
        let credential_file = self.resolve_credential(raw.credential_file.as_deref())?;

        let package_task = required(raw.package_task.as_ref());
        if let Some(name) = &package_task {
            if !scheduler.has_task(name) {
                return Err(ConfigError::UnknownPackageTask { name: name.clone() });
            }
        }

        let source_files = raw
            .source_files
            .clone()
            .map(super::spec::SourceFiles::into_specs)
            .filter(|specs| !specs.is_empty())
            .unwrap_or_else(|| vec![String::from(DEFAULT_SOURCE)])
            .into_iter()
            .map(|spec| self.resolve_source(&spec))
            .collect();

        let config = DeploymentConfig {
            host,
            port: raw.port.unwrap_or(DEFAULT_PORT),
            username,
            remote_directory,
            credential_file,
            source_files,
            package_task,
            releases_to_keep: raw.releases_to_keep,
            group: required(raw.group.as_ref()),
            permissions: required(raw.permissions.as_ref()),
            metadata_file: self.resolve_local(Path::new(
                &required(raw.metadata_file.as_ref())
                    .unwrap_or_else(|| String::from(DEFAULT_METADATA_FILE)),
            )),
        };

        debug!(
            "Configuration validation passed for {}:{}",
            config.destination(),
            config.port
        );
        Ok(config)
    }

    /// Expands and checks the credential path.
    fn resolve_credential(&self, path: Option<&str>) -> Result<PathBuf, ConfigError> {
        let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
            return Err(ConfigError::CredentialNotFound { path: None });
        };

        let expanded = self.resolve_local(&self.expand_home(path));
        if expanded.is_file() {
            Ok(expanded)
        } else {
            Err(ConfigError::CredentialNotFound {
                path: Some(expanded),
            })
        }
    }

    /// Joins a relative path onto the base directory, if one is set.
    fn resolve_local(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Resolves a source spec; `.` becomes the base directory itself.
    fn resolve_source(&self, spec: &str) -> String {
        match &self.base_dir {
            Some(base) if spec.trim_end_matches('/') == DEFAULT_SOURCE => {
                base.display().to_string()
            }
            Some(_) => self.resolve_local(Path::new(spec)).display().to_string(),
            None => spec.to_string(),
        }
    }

    /// Replaces a leading `~` (alone or followed by `/`) with the home directory.
    #[must_use]
    pub fn expand_home(&self, path: &str) -> PathBuf {
        let Some(home) = &self.home_dir else {
            return PathBuf::from(path);
        };

        if path == "~" {
            home.clone()
        } else if let Some(rest) = path.strip_prefix("~/") {
            home.join(rest)
        } else {
            Path::new(path).to_path_buf()
        }
    }
}

/// Returns the trimmed value if it is present and not blank.
fn required(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
