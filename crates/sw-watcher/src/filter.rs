//! Ignore filtering for watch notifications.
//!
//! This module provides [`IgnoreFilter`], which drops notifications whose
//! filename (the final path component) matches any configured glob. Globs
//! are translated to anchored regular expressions once, when added:
//!
//! | Glob | Meaning                         |
//! |------|---------------------------------|
//! | `*`  | any run of characters           |
//! | `?`  | exactly one character           |
//! | else | the literal character           |
//!
//! Matching is case-sensitive and never looks at parent directories.
//!
//! # Examples
//!
//! ```
//! use sw_watcher::IgnoreFilter;
//! use camino::Utf8Path;
//!
//! let mut filter = IgnoreFilter::new();
//! filter.add("*.tmp").unwrap();
//! filter.add(".*").unwrap();
//!
//! assert!(filter.should_ignore(Utf8Path::new("/srv/share/scratch.tmp")));
//! assert!(filter.should_ignore(Utf8Path::new("/srv/share/.hidden")));
//! assert!(!filter.should_ignore(Utf8Path::new("/srv/share/report.txt")));
//! ```

use camino::Utf8Path;
use regex::Regex;

use crate::error::WatchError;

/// A glob together with its compiled regular expression.
#[derive(Debug, Clone)]
struct IgnorePattern {
    glob: String,
    regex: Regex,
}

/// An ordered set of filename globs.
///
/// Patterns are stored verbatim in insertion order; order does not affect
/// matching. Adding a duplicate is a no-op and removal is by exact string.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreFilter {
    /// Creates an empty filter that ignores nothing.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter from a list of globs.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPattern`] for the first glob that fails
    /// to compile.
    pub fn from_patterns<I, S>(globs: I) -> Result<Self, WatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for glob in globs {
            filter.add(glob.as_ref())?;
        }
        Ok(filter)
    }

    /// Adds a glob.
    ///
    /// Returns `Ok(false)` if the exact glob is already present.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPattern`] if the translated expression
    /// cannot be compiled.
    pub fn add(&mut self, glob: &str) -> Result<bool, WatchError> {
        if self.contains(glob) {
            return Ok(false);
        }

        let regex = Regex::new(&glob_to_regex(glob)).map_err(|source| {
            WatchError::InvalidPattern {
                pattern: glob.to_owned(),
                source,
            }
        })?;

        self.patterns.push(IgnorePattern {
            glob: glob.to_owned(),
            regex,
        });
        Ok(true)
    }

    /// Removes a glob by exact match. Returns `true` if it was present.
    pub fn remove(&mut self, glob: &str) -> bool {
        let before = self.patterns.len();
        self.patterns.retain(|pattern| pattern.glob != glob);
        self.patterns.len() != before
    }

    /// Removes every glob.
    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    /// Returns `true` if `glob` is configured.
    #[must_use]
    pub fn contains(&self, glob: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.glob == glob)
    }

    /// Returns the configured globs in insertion order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|pattern| pattern.glob.as_str())
    }

    /// Returns the number of configured globs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if no globs are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns `true` if the filename of `path` matches any glob.
    ///
    /// Paths without a final component (such as `/`) are never ignored.
    #[must_use]
    pub fn should_ignore(&self, path: &Utf8Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let Some(name) = path.file_name() else {
            return false;
        };

        self.patterns.iter().any(|pattern| pattern.regex.is_match(name))
    }
}

/// Translates a filename glob to an anchored regular expression.
///
/// # Examples
///
/// ```
/// use sw_watcher::filter::glob_to_regex;
///
/// assert_eq!(glob_to_regex("*.tmp"), r"(?s)^.*\.tmp$");
/// assert_eq!(glob_to_regex("a?c"), "(?s)^a.c$");
/// ```
#[must_use]
pub fn glob_to_regex(glob: &str) -> String {
    let mut expr = String::with_capacity(glob.len() * 2 + 6);
    expr.push_str("(?s)^");

    let mut buf = [0u8; 4];
    for ch in glob.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            literal => expr.push_str(&regex::escape(literal.encode_utf8(&mut buf))),
        }
    }

    expr.push('$');
    expr
}
