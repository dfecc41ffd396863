//! Cached filesystem attributes for watched paths.
//!
//! A [`Snapshot`] records what a path looked like the last time the engine
//! observed it. The [`SnapshotCache`] keys snapshots by canonical path and is
//! pure storage: it performs no validation and never touches the disk.
//!
//! A path with no cached snapshot is treated as "never observed", which the
//! classifier reads as `exists = false`.

use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashMap;
use sw_core::EntryKind;

/// Attributes of a path at the time it was last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Whether the path existed.
    pub exists: bool,

    /// Whether the path was a directory.
    pub is_directory: bool,

    /// Last modification time, if the platform reports one.
    pub modified: Option<SystemTime>,

    /// Size in bytes. Always `0` for directories.
    pub size_bytes: u64,

    /// Permission bits. Compared for equality only.
    pub permissions: u32,
}

impl Snapshot {
    /// Reads the current attributes of `path`.
    ///
    /// Returns `None` if the path cannot be stat'ed, which covers both
    /// "does not exist" and "not accessible".
    #[must_use]
    pub fn capture(path: &Utf8Path) -> Option<Self> {
        std::fs::metadata(path).ok().map(|meta| Self::from_metadata(&meta))
    }

    /// Builds a snapshot from already-fetched metadata.
    #[must_use]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let is_directory = meta.is_dir();
        Self {
            exists: true,
            is_directory,
            modified: meta.modified().ok(),
            size_bytes: if is_directory { 0 } else { meta.len() },
            permissions: permission_bits(meta),
        }
    }

    /// Returns the entry kind this snapshot describes.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        EntryKind::from_is_dir(self.is_directory)
    }
}

#[cfg(unix)]
fn permission_bits(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &std::fs::Metadata) -> u32 {
    u32::from(meta.permissions().readonly())
}

/// Map from canonical path to its last observed [`Snapshot`].
///
/// Owned exclusively by the watcher facade; at most one snapshot exists per
/// path.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: FxHashMap<Utf8PathBuf, Snapshot>,
}

impl SnapshotCache {
    /// Creates an empty cache.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `snapshot` for `path`, replacing any previous entry.
    pub fn put(&mut self, path: Utf8PathBuf, snapshot: Snapshot) {
        self.entries.insert(path, snapshot);
    }

    /// Returns the cached snapshot for `path`.
    #[must_use]
    pub fn get(&self, path: &Utf8Path) -> Option<&Snapshot> {
        self.entries.get(path)
    }

    /// Removes and returns the cached snapshot for `path`.
    pub fn remove(&mut self, path: &Utf8Path) -> Option<Snapshot> {
        self.entries.remove(path)
    }

    /// Returns `true` if a snapshot is cached for `path`.
    #[must_use]
    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Returns the number of cached snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keeps only the snapshots whose path satisfies `keep`. Returns the
    /// number evicted.
    pub fn retain(&mut self, mut keep: impl FnMut(&Utf8Path) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| keep(path));
        before - self.entries.len()
    }

    /// Drops every cached snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
