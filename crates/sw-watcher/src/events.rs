//! Events emitted by the change watcher.
//!
//! Every notification that survives the enable switch and the ignore filter
//! produces two events for the same `(path, change)` pair:
//!
//! ```text
//! notification
//!      │
//!      ├──► FileChanged / DirectoryChanged   (immediately)
//!      │
//!      ▼
//! Coalescer ──► PathChanged                  (after the quiet period,
//!                                             or immediately with a zero window)
//! ```
//!
//! Failed add requests produce a [`WatchEvent::WatchFailed`] with a
//! human-readable reason.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use sw_core::ChangeType;

use crate::debounce::CoalescedChange;

/// A change-watcher event.
///
/// Serializes with an `event` tag, for example
/// `{"event":"path_changed","path":"/srv/a.txt","change":"file_modified"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    /// Immediate notification for a file (or any path not known to be a
    /// watched directory).
    FileChanged {
        /// The changed path.
        path: Utf8PathBuf,
        /// The classified change.
        change: ChangeType,
    },

    /// Immediate notification for a watched directory.
    DirectoryChanged {
        /// The changed directory.
        path: Utf8PathBuf,
        /// The classified change.
        change: ChangeType,
    },

    /// Coalesced notification emitted after the debounce window.
    PathChanged {
        /// The changed path.
        path: Utf8PathBuf,
        /// The last change recorded for the path within the window.
        change: ChangeType,
    },

    /// A path could not be added to the watch set.
    WatchFailed {
        /// The path as supplied by the caller.
        path: Utf8PathBuf,
        /// Why the watch failed.
        reason: String,
    },
}

impl WatchEvent {
    /// Returns the path this event refers to.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::FileChanged { path, .. }
            | Self::DirectoryChanged { path, .. }
            | Self::PathChanged { path, .. }
            | Self::WatchFailed { path, .. } => path,
        }
    }

    /// Returns the classified change, if this is a change event.
    #[must_use]
    pub const fn change(&self) -> Option<ChangeType> {
        match self {
            Self::FileChanged { change, .. }
            | Self::DirectoryChanged { change, .. }
            | Self::PathChanged { change, .. } => Some(*change),
            Self::WatchFailed { .. } => None,
        }
    }

    /// Returns `true` for post-debounce events.
    #[must_use]
    pub const fn is_coalesced(&self) -> bool {
        matches!(self, Self::PathChanged { .. })
    }

    /// Returns `true` for immediate change events.
    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        matches!(self, Self::FileChanged { .. } | Self::DirectoryChanged { .. })
    }

    /// Returns a short label for text output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FileChanged { .. } => "file",
            Self::DirectoryChanged { .. } => "directory",
            Self::PathChanged { .. } => "changed",
            Self::WatchFailed { .. } => "failed",
        }
    }
}

impl From<CoalescedChange> for WatchEvent {
    fn from(coalesced: CoalescedChange) -> Self {
        Self::PathChanged {
            path: coalesced.path,
            change: coalesced.change,
        }
    }
}

impl std::fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileChanged { path, change }
            | Self::DirectoryChanged { path, change }
            | Self::PathChanged { path, change } => {
                write!(f, "[{}] {change}: {path}", self.label())
            }
            Self::WatchFailed { reason, .. } => write!(f, "[failed] {reason}"),
        }
    }
}
