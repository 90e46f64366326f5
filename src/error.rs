//! Error types for the release deployment system.
//!
//! Configuration errors are raised synchronously while the deployment plan
//! is assembled, before any remote side effect. Transport errors surface
//! while the pipeline runs and are never retried here.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the release deployment system.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task graph and scheduling errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Remote transport errors.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Project metadata errors.
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No configuration object was supplied, or it was empty.
    #[error("deployment options are not properly configured")]
    MissingConfig,

    /// The `host` option is missing.
    #[error("deployment options must contain a host")]
    MissingHost,

    /// The `remote_directory` option is missing.
    #[error("deployment options must identify the remote directory where releases are placed")]
    MissingRemoteDirectory,

    /// The `username` option is missing.
    #[error("deployment options must contain a remote username")]
    MissingUsername,

    /// The credential file is unset or does not exist locally.
    #[error("unable to find credential file: {}", describe_path(.path))]
    CredentialNotFound {
        /// The expanded credential path, if one was configured.
        path: Option<PathBuf>,
    },

    /// The configured package task is not registered with the scheduler.
    #[error("package task not found: {name}")]
    UnknownPackageTask {
        /// Name of the missing task.
        name: String,
    },

    /// The upload source specs matched no files.
    #[error("source files matched nothing: {specs}")]
    NoSourceFiles {
        /// The source specs, comma separated.
        specs: String,
    },

    /// The release version string is empty.
    #[error("release version is empty")]
    MissingVersion,

    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },
}

/// Discriminant of a [`ConfigError`], for matching on the kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigErrorKind {
    /// See [`ConfigError::MissingConfig`].
    MissingConfig,
    /// See [`ConfigError::MissingHost`].
    MissingHost,
    /// See [`ConfigError::MissingRemoteDirectory`].
    MissingRemoteDirectory,
    /// See [`ConfigError::MissingUsername`].
    MissingUsername,
    /// See [`ConfigError::CredentialNotFound`].
    CredentialNotFound,
    /// See [`ConfigError::UnknownPackageTask`].
    UnknownPackageTask,
    /// See [`ConfigError::NoSourceFiles`].
    NoSourceFiles,
    /// See [`ConfigError::MissingVersion`].
    MissingVersion,
    /// See [`ConfigError::FileNotFound`].
    FileNotFound,
    /// See [`ConfigError::ParseError`].
    ParseError,
}

/// Task graph and scheduler errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// A task with this name is already registered.
    #[error("Task already registered: {name}")]
    DuplicateTask {
        /// The duplicated task name.
        name: String,
    },

    /// The requested task is not registered.
    #[error("Task not found: {name}")]
    UnknownTask {
        /// The missing task name.
        name: String,
    },

    /// A task depends on a name that is not registered.
    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency {
        /// The task declaring the dependency.
        task: String,
        /// The missing dependency.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// Remote transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local ssh/scp process could not be started.
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A command batch (remote or local) exited non-zero.
    #[error("Command failed (exit {exit_code}): {command}: {stderr}")]
    CommandFailed {
        /// The command batch that failed.
        command: String,
        /// Exit code, or -1 if terminated by a signal.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// Copying files to the remote host failed.
    #[error("Failed to copy to {destination}: {message}")]
    CopyFailed {
        /// Remote destination path.
        destination: String,
        /// Description of the failure.
        message: String,
    },
}

/// Project metadata errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The metadata file does not exist.
    #[error("Metadata file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The metadata file could not be read or parsed.
    #[error("Failed to parse metadata file {path}: {message}")]
    ParseError {
        /// Path to the file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// The metadata file has no usable `version` field.
    #[error("Metadata file {path} has no version field")]
    MissingVersionField {
        /// Path to the file.
        path: PathBuf,
    },
}

/// Result type alias for release deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Returns true if the failure is transient and a retry could succeed.
    ///
    /// Nothing in this crate retries; the flag is surfaced to callers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(TransportError::SpawnFailed { .. }))
    }
}

impl ConfigError {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ConfigErrorKind {
        match self {
            Self::MissingConfig => ConfigErrorKind::MissingConfig,
            Self::MissingHost => ConfigErrorKind::MissingHost,
            Self::MissingRemoteDirectory => ConfigErrorKind::MissingRemoteDirectory,
            Self::MissingUsername => ConfigErrorKind::MissingUsername,
            Self::CredentialNotFound { .. } => ConfigErrorKind::CredentialNotFound,
            Self::UnknownPackageTask { .. } => ConfigErrorKind::UnknownPackageTask,
            Self::NoSourceFiles { .. } => ConfigErrorKind::NoSourceFiles,
            Self::MissingVersion => ConfigErrorKind::MissingVersion,
            Self::FileNotFound { .. } => ConfigErrorKind::FileNotFound,
            Self::ParseError { .. } => ConfigErrorKind::ParseError,
        }
    }

    /// Returns the offending value carried by this error, if any.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::CredentialNotFound { path } => path.as_ref().map(|p| p.display().to_string()),
            Self::UnknownPackageTask { name } => Some(name.clone()),
            Self::NoSourceFiles { specs } => Some(specs.clone()),
            Self::FileNotFound { path } => Some(path.display().to_string()),
            Self::ParseError { location, .. } => location.clone(),
            _ => None,
        }
    }

    /// Creates a parse error with an optional source location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl TransportError {
    /// Creates a copy error.
    #[must_use]
    pub fn copy(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CopyFailed {
            destination: destination.into(),
            message: message.into(),
        }
    }
}

#[allow(clippy::ref_option)]
fn describe_path(path: &Option<PathBuf>) -> String {
    path.as_deref().map_or_else(|| String::from("(not configured)"), |p| p.display().to_string())
}
