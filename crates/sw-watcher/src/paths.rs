//! Path normalization helpers.
//!
//! Watch-set keys are canonical absolute paths. Paths that no longer exist
//! cannot be canonicalized, so lookups fall back to canonicalizing the
//! parent and re-attaching the file name, and finally to plain absolute
//! resolution against the working directory.

use std::path::MAIN_SEPARATOR_STR;

use camino::{Utf8Path, Utf8PathBuf};

/// Resolves `path` to the key it would have in the watch set.
#[must_use]
pub fn watch_key(path: &Utf8Path) -> Utf8PathBuf {
    if let Ok(canonical) = path.canonicalize_utf8() {
        return canonical;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_str().is_empty() {
            Utf8Path::new(".")
        } else {
            parent
        };
        if let Ok(parent) = parent.canonicalize_utf8() {
            return parent.join(name);
        }
    }

    absolute(path)
}

/// Joins a relative path onto the current working directory.
fn absolute(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        return path.to_owned();
    }

    std::env::current_dir()
        .ok()
        .and_then(|cwd| Utf8PathBuf::from_path_buf(cwd).ok())
        .map_or_else(|| path.to_owned(), |cwd| cwd.join(path))
}

/// Returns the string prefix shared by every path strictly below `dir`.
///
/// The separator is part of the prefix, so `/data` never claims `/data2`.
#[must_use]
pub fn descendant_prefix(dir: &Utf8Path) -> String {
    let mut prefix = dir.as_str().to_owned();
    if !prefix.ends_with(MAIN_SEPARATOR_STR) {
        prefix.push_str(MAIN_SEPARATOR_STR);
    }
    prefix
}

/// Returns `true` if `path` lies strictly below `dir` by string prefix.
#[must_use]
pub fn is_descendant(path: &Utf8Path, prefix: &str) -> bool {
    path.as_str().starts_with(prefix)
}
