// src/core/paths.rs

//! String based path helpers.
//!
//! Template sources and output paths are plain strings (they are also keys of
//! the render output), so these helpers work on `/` separated strings instead
//! of `PathBuf`. `join` follows the usual "concatenate then normalize" rule:
//! `.` segments vanish, `..` pops a segment, and an absolute segment in the
//! middle of the list is appended rather than restarting the path.

use crate::constants::{CONFIG_CACHE_FILENAME, PLI_DIR};
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

const SEPARATOR: char = '/';

/// Converts platform separators to `/`.
pub fn to_slash(path: &str) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}

/// Converts a filesystem path to its `/` separated string form.
pub fn path_to_string(path: &Path) -> String {
    to_slash(&path.to_string_lossy())
}

pub fn is_absolute(path: &str) -> bool {
    let path = to_slash(path);
    if path.starts_with(SEPARATOR) {
        return true;
    }
    // Windows drive prefix, e.g. `C:/`.
    let bytes = path.as_bytes();
    matches!(bytes, [drive, b':', b'/', ..] if drive.is_ascii_alphabetic())
}

/// Collapses `.`, `..` and repeated separators. An empty path becomes `.`.
pub fn normalize(path: &str) -> String {
    let path = to_slash(path);
    let absolute = path.starts_with(SEPARATOR);
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // `..` above the root of an absolute path is dropped.
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let body = segments.join("/");
    match (absolute, body.is_empty()) {
        (true, _) => format!("/{body}"),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

/// Joins segments with `/` and normalizes the result. Empty segments are skipped.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let joined = segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    normalize(&joined)
}

/// `path` itself when absolute, otherwise `path` joined onto `base`.
pub fn resolve(base: &str, path: &str) -> String {
    if is_absolute(path) {
        normalize(path)
    } else {
        join(&[base, path])
    }
}

/// The path that leads from `from` to `to`. Equal paths give an empty string.
pub fn relative(from: &str, to: &str) -> String {
    let from = normalize(from);
    let to = normalize(to);
    let from_segments: Vec<&str> = from.split(SEPARATOR).filter(|s| !s.is_empty() && *s != ".").collect();
    let to_segments: Vec<&str> = to.split(SEPARATOR).filter(|s| !s.is_empty() && *s != ".").collect();

    let common = from_segments
        .iter()
        .zip(&to_segments)
        .take_while(|(a, b)| a == b)
        .count();

    let ups = from_segments.len().saturating_sub(common);
    let mut parts: Vec<&str> = std::iter::repeat_n("..", ups).collect();
    parts.extend(to_segments.iter().skip(common));
    parts.join("/")
}

/// Whether `path` is `base` itself or lies below it.
pub fn is_within(base: &str, path: &str) -> bool {
    let rel = relative(base, path);
    !rel.starts_with("..") && !is_absolute(&rel)
}

/// Everything but the last segment; `.` for a bare name and `/` for a root entry.
pub fn dirname(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind(SEPARATOR) {
        Some(0) => "/".to_string(),
        Some(pos) => normalized.get(..pos).unwrap_or_default().to_string(),
        None => ".".to_string(),
    }
}

/// The last segment of `path`.
pub fn basename(path: &str) -> String {
    let normalized = normalize(path);
    normalized
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or_default()
        .to_string()
}

/// The non-empty segments of `path`.
pub fn split(path: &str) -> Vec<String> {
    normalize(path)
        .split(SEPARATOR)
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

/// Expands `~` and environment variables in a user given path.
pub fn expand_user_path(template: &str) -> Result<String> {
    let expanded = shellexpand::full(template)
        .map_err(|e| anyhow!("Failed to expand path '{}': {}", template, e))?;
    Ok(expanded.into_owned())
}

/// Resolves a user given directory against `cwd` and canonicalizes it when it exists.
pub fn resolve_user_dir(cwd: &str, input: &str) -> Result<String> {
    let expanded = expand_user_path(input)?;
    let joined = resolve(cwd, &expanded);
    Ok(match dunce::canonicalize(&joined) {
        Ok(path) => path_to_string(&path),
        Err(_) => joined,
    })
}

/// The canonical working directory as a `/` separated string.
pub fn current_dir() -> Result<String> {
    let cwd = std::env::current_dir()?;
    Ok(path_to_string(&dunce::canonicalize(&cwd).unwrap_or(cwd)))
}

/// Location of the compiled configuration cache of a project rooted at `cwd`.
pub fn config_cache_path(cwd: &str) -> PathBuf {
    PathBuf::from(cwd)
        .join(PLI_DIR)
        .join("cache")
        .join(CONFIG_CACHE_FILENAME)
}
