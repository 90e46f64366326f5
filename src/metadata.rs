//! Project metadata: the release version.
//!
//! The version comes from the `version` field of a JSON (`package.json`)
//! or YAML metadata file.

use std::path::Path;
use tracing::debug;

use crate::error::{MetadataError, Result};

/// Reads the `version` field of a metadata file.
///
/// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
/// as JSON.
///
/// # Errors
///
/// Returns an error if the file is missing, unparsable, or has no
/// non-empty string `version` field.
pub fn read_version(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(MetadataError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    let content = std::fs::read_to_string(path).map_err(|e| MetadataError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let version = if is_yaml {
        let value: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| MetadataError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        value.get("version").and_then(serde_yaml::Value::as_str).map(str::to_string)
    } else {
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| MetadataError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        value.get("version").and_then(serde_json::Value::as_str).map(str::to_string)
    };

    let version = version
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MetadataError::MissingVersionField {
            path: path.to_path_buf(),
        })?;

    debug!("Read version {} from {}", version, path.display());
    Ok(version)
}
