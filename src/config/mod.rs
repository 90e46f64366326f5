//! Configuration module for release deployments.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `release-deploy.yaml`
//! - Validation of required options and application of defaults

mod spec;
mod parser;
mod validator;

pub use spec::{
    DEFAULT_METADATA_FILE, DEFAULT_PORT, DEFAULT_SOURCE, DeploymentConfig, RawDeployConfig,
    SourceFiles,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::ConfigValidator;
