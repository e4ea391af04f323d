//! Helpers for absolute, `/`-separated store paths.

use crate::{Result, RetrofitError};

/// Last segment of `path`; empty for `/`.
pub fn name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Parent of `path`, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" || path.is_empty() {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Append a single child name to a parent path.
pub fn join(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Check that `path` is absolute and contains no empty, `.` or `..` segments.
pub fn validate_absolute(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(invalid(path, "path must be absolute"));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(invalid(path, "path must not end with '/'"));
    }
    for segment in path[1..].split('/') {
        match segment {
            "" => return Err(invalid(path, "empty path segment")),
            "." | ".." => return Err(invalid(path, "relative segment in absolute path")),
            _ => {}
        }
    }
    Ok(())
}

/// Check that `name` can be used as a single path segment.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(invalid(name, "not a valid node name"));
    }
    Ok(())
}

/// Resolve `relative` against `base`. Supports `.` and `..` segments; an
/// absolute `relative` is returned normalized as-is.
pub fn resolve_relative(base: &str, relative: &str) -> Result<String> {
    let mut segments: Vec<&str> = if relative.starts_with('/') {
        Vec::new()
    } else {
        validate_absolute(base)?;
        base.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(invalid(relative, "climbs above the root"));
                }
            }
            s => segments.push(s),
        }
    }

    Ok(format!("/{}", segments.join("/")))
}

/// `true` if `path` equals `ancestor` or lies below it.
pub fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path.starts_with('/');
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

fn invalid(path: &str, reason: &str) -> RetrofitError {
    RetrofitError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
