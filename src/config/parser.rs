//! Configuration parser for loading deployment configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, DeployError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::RawDeployConfig;

/// Configuration parser for loading deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// Returns `None` when the document is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Option<RawDeployConfig>> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(DeployError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(ConfigError::parse(
                format!("Failed to read file: {e}"),
                Some(path.display().to_string()),
            ))
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// An empty document, `null`, or an empty mapping yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Option<RawDeployConfig>> {
        debug!("Parsing YAML configuration");
        let location = || source.map(|p| p.display().to_string());

        let value: serde_yaml::Value = if content.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                DeployError::Config(ConfigError::parse(format!("YAML parse error: {e}"), location()))
            })?
        };

        let is_empty = match &value {
            serde_yaml::Value::Null => true,
            serde_yaml::Value::Mapping(map) => map.is_empty(),
            _ => false,
        };
        if is_empty {
            debug!("Configuration document is empty");
            return Ok(None);
        }

        let config: RawDeployConfig = serde_yaml::from_value(value).map_err(|e| {
            DeployError::Config(ConfigError::parse(format!("YAML parse error: {e}"), location()))
        })?;

        Ok(Some(config))
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognized variables: `RELEASE_DEPLOY_HOST`, `RELEASE_DEPLOY_PORT`,
    /// `RELEASE_DEPLOY_USERNAME`, `RELEASE_DEPLOY_CREDENTIAL_FILE` and
    /// `RELEASE_DEPLOY_REMOTE_DIRECTORY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// `RELEASE_DEPLOY_PORT` is not a valid port.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<Option<RawDeployConfig>> {
        let Some(mut config) = self.load_file(path)? else {
            return Ok(None);
        };
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(Some(config))
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(
        config: &mut RawDeployConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(host) = lookup("RELEASE_DEPLOY_HOST") {
            debug!("Overriding host from environment");
            config.host = Some(host);
        }

        if let Some(port) = lookup("RELEASE_DEPLOY_PORT") {
            debug!("Overriding port from environment");
            let port = port.trim().parse::<u16>().map_err(|e| {
                DeployError::Config(ConfigError::parse(
                    format!("Invalid RELEASE_DEPLOY_PORT '{port}': {e}"),
                    None,
                ))
            })?;
            config.port = Some(port);
        }

        if let Some(username) = lookup("RELEASE_DEPLOY_USERNAME") {
            debug!("Overriding username from environment");
            config.username = Some(username);
        }

        if let Some(credential) = lookup("RELEASE_DEPLOY_CREDENTIAL_FILE") {
            debug!("Overriding credential_file from environment");
            config.credential_file = Some(credential);
        }

        if let Some(directory) = lookup("RELEASE_DEPLOY_REMOTE_DIRECTORY") {
            debug!("Overriding remote_directory from environment");
            config.remote_directory = Some(directory);
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                DeployError::Config(ConfigError::parse(
                    format!("Failed to load .env file: {e}"),
                    Some(env_path.display().to_string()),
                ))
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "release-deploy.yaml",
    "release-deploy.yml",
    "deploy.yaml",
    "deploy.yml",
];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(DeployError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceFiles;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_init_template_parses() {
        let template = include_str!("../../templates/release-deploy.yaml");
        let config = ConfigParser::new()
            .parse_yaml(template, None)
            .unwrap()
            .expect("template should not be empty");

        assert_eq!(config.host.as_deref(), Some("example.com"));
        assert_eq!(config.remote_directory.as_deref(), Some("/srv/app"));
        assert!(config.tasks.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
host: endor.example.com
port: 22
remote_directory: /var/www/arbitrator
username: deploy
credential_file: ~/.ssh/id_rsa
releases_to_keep: 3
group: www-glasstower
permissions: "ugo+rX"
package_task: package
source_files:
  - dist/*.deb
tasks:
  package: make dist
"#;
        let config = ConfigParser::new()
            .parse_yaml(yaml, None)
            .unwrap()
            .expect("config should be present");

        assert_eq!(config.host.as_deref(), Some("endor.example.com"));
        assert_eq!(config.releases_to_keep, Some(3));
        assert_eq!(config.permissions.as_deref(), Some("ugo+rX"));
        assert_eq!(
            config.source_files,
            Some(SourceFiles::Many(vec![String::from("dist/*.deb")]))
        );
        assert_eq!(config.tasks.get("package").map(String::as_str), Some("make dist"));
    }

    #[test]
    fn test_empty_documents_are_none() {
        let parser = ConfigParser::new();
        assert!(parser.parse_yaml("", None).unwrap().is_none());
        assert!(parser.parse_yaml("{}", None).unwrap().is_none());
        assert!(parser.parse_yaml("~", None).unwrap().is_none());
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ConfigParser::new().parse_yaml("host: [unclosed", None);
        assert!(matches!(
            result,
            Err(DeployError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RELEASE_DEPLOY_HOST", "override.example.com"),
            ("RELEASE_DEPLOY_PORT", "2200"),
        ]
        .into_iter()
        .collect();
        let mut config = RawDeployConfig {
            host: Some(String::from("original.example.com")),
            ..RawDeployConfig::default()
        };

        ConfigParser::apply_env_overrides(&mut config, |k| vars.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.host.as_deref(), Some("override.example.com"));
        assert_eq!(config.port, Some(2200));
        assert!(config.username.is_none());
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = RawDeployConfig::default();
        let result = ConfigParser::apply_env_overrides(&mut config, |k| {
            (k == "RELEASE_DEPLOY_PORT").then(|| String::from("not-a-port"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("deploy.yaml"), "host: h\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, temp.path().join("deploy.yaml"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let result = ConfigParser::new().load_file(temp.path().join("nope.yaml"));
        assert!(matches!(
            result,
            Err(DeployError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
