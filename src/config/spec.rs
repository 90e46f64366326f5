//! Configuration types for release deployments.
//!
//! [`RawDeployConfig`] maps one-to-one onto the YAML file and is sparse:
//! every field is optional. [`DeploymentConfig`] is what the validator
//! produces: required fields present, defaults applied, paths expanded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default upload source when none is configured.
pub const DEFAULT_SOURCE: &str = ".";

/// Default project metadata file holding the release version.
pub const DEFAULT_METADATA_FILE: &str = "package.json";

/// The deployment configuration as written in the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RawDeployConfig {
    /// Remote host name or address.
    #[serde(default)]
    pub host: Option<String>,
    /// Remote SSH port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Remote user name.
    #[serde(default)]
    pub username: Option<String>,
    /// Absolute directory on the remote host that holds releases.
    #[serde(default)]
    pub remote_directory: Option<String>,
    /// Private key used to authenticate; may start with `~`.
    #[serde(default)]
    pub credential_file: Option<String>,
    /// Files, directories, or globs to upload.
    #[serde(default)]
    pub source_files: Option<SourceFiles>,
    /// Task that must run before the upload.
    #[serde(default)]
    pub package_task: Option<String>,
    /// Number of releases to keep on the remote host.
    #[serde(default)]
    pub releases_to_keep: Option<u32>,
    /// POSIX group applied to the uploaded release.
    #[serde(default)]
    pub group: Option<String>,
    /// POSIX permission spec applied to the uploaded release.
    #[serde(default)]
    pub permissions: Option<String>,
    /// Project metadata file that carries the release version.
    #[serde(default)]
    pub metadata_file: Option<String>,
    /// Local tasks (name -> shell command) registered alongside the pipeline.
    #[serde(default)]
    pub tasks: BTreeMap<String, String>,
}

/// One or many upload source specs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SourceFiles {
    /// A single path or glob.
    One(String),
    /// A list of paths or globs.
    Many(Vec<String>),
}

/// A validated deployment configuration.
///
/// Immutable once built; only [`ConfigValidator`](super::ConfigValidator)
/// constructs it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// Remote host name or address.
    pub host: String,
    /// Remote SSH port.
    pub port: u16,
    /// Remote user name.
    pub username: String,
    /// Directory on the remote host that holds releases.
    pub remote_directory: String,
    /// Expanded local path of the private key.
    pub credential_file: PathBuf,
    /// Upload source specs, never empty.
    pub source_files: Vec<String>,
    /// Task that must run before the upload.
    pub package_task: Option<String>,
    /// Number of releases to keep, if pruning was requested.
    pub releases_to_keep: Option<u32>,
    /// POSIX group applied to the uploaded release.
    pub group: Option<String>,
    /// POSIX permission spec applied to the uploaded release.
    pub permissions: Option<String>,
    /// Project metadata file that carries the release version.
    pub metadata_file: PathBuf,
}

impl RawDeployConfig {
    /// Returns true if no option at all is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl SourceFiles {
    /// Flattens into a list of specs, dropping blank entries.
    #[must_use]
    pub fn into_specs(self) -> Vec<String> {
        let specs = match self {
            Self::One(spec) => vec![spec],
            Self::Many(specs) => specs,
        };
        specs.into_iter().filter(|s| !s.trim().is_empty()).collect()
    }
}

impl DeploymentConfig {
    /// Returns the retention count when pruning is enabled.
    #[must_use]
    pub fn retention(&self) -> Option<u32> {
        self.releases_to_keep.filter(|keep| *keep > 0)
    }

    /// Returns `user@host` for the remote login.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}
