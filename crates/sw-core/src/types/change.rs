//! Change classification types.
//!
//! This module provides the [`ChangeType`] enum, the result of comparing a
//! path's current filesystem attributes against its cached snapshot.

use serde::{Deserialize, Serialize};

use super::EntryKind;

/// The classified kind of a filesystem change.
///
/// Produced by the change classifier for every notification that passes the
/// ignore filter. File and directory variants are kept distinct so consumers
/// can route them without a second `stat`.
///
/// # Examples
///
/// ```
/// use sw_core::{ChangeType, EntryKind};
///
/// let change = ChangeType::modified(EntryKind::File);
/// assert_eq!(change, ChangeType::FileModified);
/// assert!(!change.is_directory());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ChangeType {
    /// A file appeared that had never been observed.
    FileCreated,

    /// A known file changed its modification time or size.
    FileModified,

    /// A previously existing file is gone.
    FileDeleted,

    /// A directory appeared that had never been observed.
    DirectoryCreated,

    /// A known directory changed (typically a child was added or removed).
    DirectoryModified,

    /// A previously existing directory is gone.
    DirectoryDeleted,

    /// The permission bits of a known path changed.
    ///
    /// Takes precedence over a simultaneous content change.
    PermissionsChanged,

    /// The notification could not be attributed to any change, e.g. a
    /// callback for a path that neither exists nor was ever observed.
    #[default]
    Unknown,
}

impl ChangeType {
    /// Returns the creation variant for the given entry kind.
    #[inline]
    #[must_use]
    pub const fn created(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => Self::FileCreated,
            EntryKind::Directory => Self::DirectoryCreated,
        }
    }

    /// Returns the modification variant for the given entry kind.
    #[inline]
    #[must_use]
    pub const fn modified(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => Self::FileModified,
            EntryKind::Directory => Self::DirectoryModified,
        }
    }

    /// Returns the deletion variant for the given entry kind.
    #[inline]
    #[must_use]
    pub const fn deleted(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => Self::FileDeleted,
            EntryKind::Directory => Self::DirectoryDeleted,
        }
    }

    /// Returns `true` if this change concerns a directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use sw_core::ChangeType;
    ///
    /// assert!(ChangeType::DirectoryCreated.is_directory());
    /// assert!(!ChangeType::FileDeleted.is_directory());
    /// assert!(!ChangeType::PermissionsChanged.is_directory());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(
            self,
            Self::DirectoryCreated | Self::DirectoryModified | Self::DirectoryDeleted
        )
    }

    /// Returns `true` for the two deletion variants.
    #[inline]
    #[must_use]
    pub const fn is_deletion(self) -> bool {
        matches!(self, Self::FileDeleted | Self::DirectoryDeleted)
    }

    /// Returns a human-readable label for this change.
    ///
    /// # Examples
    ///
    /// ```
    /// use sw_core::ChangeType;
    ///
    /// assert_eq!(ChangeType::FileModified.label(), "file modified");
    /// assert_eq!(ChangeType::Unknown.label(), "unknown");
    /// ```
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FileCreated => "file created",
            Self::FileModified => "file modified",
            Self::FileDeleted => "file deleted",
            Self::DirectoryCreated => "directory created",
            Self::DirectoryModified => "directory modified",
            Self::DirectoryDeleted => "directory deleted",
            Self::PermissionsChanged => "permissions changed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
