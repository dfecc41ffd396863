//! Error types for the sw-watcher crate.
//!
//! This module provides the [`WatchError`] type. The public facade never
//! returns it directly: a failed add is reported as `false` plus a
//! [`WatchEvent::WatchFailed`](crate::WatchEvent::WatchFailed) whose reason is
//! the error's display text.

use camino::Utf8PathBuf;

/// Errors that can occur while managing the watch set.
///
/// # Error Categories
///
/// - **Validation** ([`EmptyPath`](WatchError::EmptyPath),
///   [`PathNotFound`](WatchError::PathNotFound),
///   [`NotAFile`](WatchError::NotAFile),
///   [`NotADirectory`](WatchError::NotADirectory)): the request itself is
///   wrong; nothing was registered.
/// - **Registration** ([`Rejected`](WatchError::Rejected),
///   [`Notify`](WatchError::Notify)): the OS watch primitive refused the path,
///   e.g. inotify instance limits.
/// - **Recoverable** ([`NonUtf8Path`](WatchError::NonUtf8Path),
///   [`InvalidPattern`](WatchError::InvalidPattern)): a single item is
///   skipped and processing continues.
///
/// # Examples
///
/// ```
/// use sw_watcher::WatchError;
///
/// let err = WatchError::path_not_found("/srv/share");
/// assert!(err.is_validation());
/// assert_eq!(err.to_string(), "path does not exist: /srv/share");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// An empty path was supplied.
    #[error("path is empty")]
    EmptyPath,

    /// The specified path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// A file watch was requested for something that is not a regular file.
    #[error("path is not a regular file: {0}")]
    NotAFile(Utf8PathBuf),

    /// A directory watch was requested for something that is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    /// The watch backend refused to register the path.
    #[error("failed to watch {path}: {reason}")]
    Rejected {
        /// The path that could not be registered.
        path: Utf8PathBuf,
        /// Backend-provided explanation.
        reason: String,
    },

    /// The notify watcher failed.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An ignore glob could not be compiled.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The glob as supplied.
        pattern: String,
        /// The regex compilation failure.
        #[source]
        source: regex::Error,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Creates a new [`WatchError::Rejected`] error.
    #[inline]
    pub fn rejected(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the request was invalid before any registration
    /// was attempted.
    #[inline]
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyPath | Self::PathNotFound(_) | Self::NotAFile(_) | Self::NotADirectory(_)
        )
    }

    /// Returns `true` if this error only affects a single item and
    /// processing can continue.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_) | Self::InvalidPattern { .. })
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path)
            | Self::NotAFile(path)
            | Self::NotADirectory(path)
            | Self::Rejected { path, .. } => Some(path),
            Self::EmptyPath
            | Self::Notify(_)
            | Self::NonUtf8Path(_)
            | Self::InvalidPattern { .. }
            | Self::Io(_) => None,
        }
    }
}
