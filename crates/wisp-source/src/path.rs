//! Source path normalization.
//!
//! Source paths are slash-separated and rooted at the source tree:
//! `/rooms/tavern.lua`. They are never host filesystem paths.

use crate::SourceError;

/// Normalizes a source path to its absolute `/a/b.lua` form.
///
/// `.` segments are dropped and `..` pops a segment. Climbing above the
/// tree root is an error.
pub fn normalize(path: &str) -> Result<String, SourceError> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(SourceError::invalid_path(path));
                }
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        return Err(SourceError::invalid_path(path));
    }
    Ok(format!("/{}", parts.join("/")))
}

/// Resolves `import` as written inside `importer`.
///
/// Absolute imports pass through; relative ones are joined onto the
/// importer's directory.
pub fn resolve_import(importer: &str, import: &str) -> Result<String, SourceError> {
    if import.starts_with('/') {
        return normalize(import);
    }
    let dir = match importer.rfind('/') {
        Some(idx) => &importer[..idx],
        None => "",
    };
    normalize(&format!("{dir}/{import}"))
}
