//! Local file enumeration for uploads.
//!
//! A spec is a directory (every file beneath it), a file, or a glob. Each
//! match keeps a path relative to its base so the remote tree mirrors the
//! local one: the directory itself, the file's parent, or the glob base
//! (the leading components free of wildcard characters).

use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, DeployError, Result};

const WILDCARDS: &[char] = &['*', '?', '[', '{'];

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalFile {
    /// Path on the local filesystem.
    pub path: PathBuf,
    /// Path relative to the upload destination.
    pub relative: PathBuf,
}

/// Enumerates the files matched by one spec, in sorted order.
///
/// # Errors
///
/// Returns an error if `spec` is an invalid glob or names a path that
/// does not exist.
pub fn find_files(spec: &str) -> Result<Vec<LocalFile>> {
    let path = Path::new(spec);

    let (base, patterns) = if spec.contains(WILDCARDS) {
        (glob_base(path), expand_braces(spec))
    } else if path.is_dir() {
        let escaped = glob::Pattern::escape(spec.trim_end_matches('/'));
        (path.to_path_buf(), vec![format!("{escaped}/**/*")])
    } else if path.is_file() {
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(vec![LocalFile {
            path: path.to_path_buf(),
            relative: relative_to(path, &base),
        }]);
    } else {
        return Err(DeployError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source path not found: {spec}"),
        )));
    };

    let mut files: Vec<LocalFile> = Vec::new();
    for pattern in &patterns {
        let entries = glob::glob(pattern).map_err(|e| {
            DeployError::Config(ConfigError::parse(
                format!("invalid source pattern: {e}"),
                Some(spec.to_string()),
            ))
        })?;
        files.extend(
            entries
                .filter_map(std::result::Result::ok)
                .filter(|p| p.is_file())
                .map(|p| LocalFile {
                    relative: relative_to(&p, &base),
                    path: p,
                }),
        );
    }
    files.sort();
    files.dedup();

    debug!("Source spec '{}' matched {} file(s)", spec, files.len());
    Ok(files)
}

/// Enumerates every spec in order, dropping duplicates.
///
/// # Errors
///
/// Returns the first error from [`find_files`].
pub fn find_all(specs: &[String]) -> Result<Vec<LocalFile>> {
    let mut all: Vec<LocalFile> = Vec::new();
    for spec in specs {
        for file in find_files(spec)? {
            if !all.iter().any(|f| f.path == file.path) {
                all.push(file);
            }
        }
    }
    Ok(all)
}

/// Expands `{a,b}` alternation into one pattern per alternative.
///
/// Nested groups expand recursively. A group without a comma stays literal.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0usize;
    let mut close = None;
    let mut commas = Vec::new();
    for (offset, c) in pattern[open..].char_indices() {
        let index = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => commas.push(index),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let (prefix, suffix) = (&pattern[..open], &pattern[close + 1..]);
    if commas.is_empty() {
        let literal = &pattern[..=close];
        return expand_braces(suffix)
            .into_iter()
            .map(|rest| format!("{literal}{rest}"))
            .collect();
    }

    let mut bounds = vec![open];
    bounds.extend(commas);
    bounds.push(close);
    bounds
        .windows(2)
        .flat_map(|w| expand_braces(&format!("{prefix}{}{suffix}", &pattern[w[0] + 1..w[1]])))
        .collect()
}

/// Returns the leading components of `pattern` that contain no wildcard.
fn glob_base(pattern: &Path) -> PathBuf {
    let mut base = PathBuf::new();
    for component in pattern.components() {
        if component.as_os_str().to_string_lossy().contains(WILDCARDS) {
            break;
        }
        base.push(component);
    }
    base
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}
