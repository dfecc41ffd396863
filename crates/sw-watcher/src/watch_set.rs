//! Watch set management.
//!
//! [`WatchSet`] owns the set of watched files and directories, keyed by
//! canonical path, and is the only component that talks to the
//! [`WatchBackend`]. It seeds the snapshot cache for every path it registers
//! and evicts snapshots for every path it drops.
//!
//! # Recursive Directories
//!
//! Only directories added with `recursive = true` are recursive roots.
//! Subdirectories discovered under a root are registered individually as
//! plain directory entries; they never trigger re-walks themselves.
//!
//! ```text
//! /srv/share          (root, recursive)
//! ├── /srv/share/a    (plain)
//! │   └── /srv/share/a/b  (plain)
//! └── /srv/share/c    (plain)
//! ```
//!
//! Removing a root drops every watched path whose string form starts with
//! `root + separator`, based on the recorded set rather than a re-walk.
//! Removing any directory also evicts cached snapshots below it that no
//! remaining watch covers.

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use rustc_hash::FxHashMap;
use sw_core::EntryKind;

use crate::backend::WatchBackend;
use crate::error::WatchError;
use crate::paths::{descendant_prefix, is_descendant, watch_key};
use crate::snapshot::{Snapshot, SnapshotCache};

/// One watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WatchEntry {
    path: Utf8PathBuf,
    kind: EntryKind,
    /// Only set for directories explicitly added as recursive roots.
    recursive: bool,
}

/// Result of an add request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The path was registered.
    Added,
    /// The path was already in the watch set.
    AlreadyWatched,
}

/// Subdirectories picked up while walking a recursive root.
#[derive(Debug, Default)]
pub struct Expansion {
    /// Newly registered subdirectories.
    pub added: Vec<Utf8PathBuf>,

    /// Subdirectories that could not be watched: registrations the backend
    /// refused and paths that are not valid UTF-8.
    pub failures: Vec<WatchError>,
}

impl Expansion {
    /// Returns `true` if nothing was added and nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.failures.is_empty()
    }
}

/// The set of watched paths and the backend they are registered with.
#[derive(Debug)]
pub struct WatchSet<B: WatchBackend> {
    backend: B,
    entries: FxHashMap<Utf8PathBuf, WatchEntry>,
}

impl<B: WatchBackend> WatchSet<B> {
    /// Creates an empty watch set on top of `backend`.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: FxHashMap::default(),
        }
    }

    /// Returns the backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Registers a regular file.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty, missing or non-file paths, and
    /// the backend's error if registration fails. Nothing changes on error.
    pub fn add_file(
        &mut self,
        path: &Utf8Path,
        cache: &mut SnapshotCache,
    ) -> Result<(Utf8PathBuf, AddOutcome), WatchError> {
        let (key, snapshot) = validate(path, EntryKind::File)?;
        if self.entries.contains_key(&key) {
            return Ok((key, AddOutcome::AlreadyWatched));
        }

        self.backend.register(&key)?;
        self.insert(key.clone(), EntryKind::File, false, snapshot, cache);
        Ok((key, AddOutcome::Added))
    }

    /// Registers a directory, walking it when `recursive` is set.
    ///
    /// Re-adding a watched plain directory with `recursive = true` promotes
    /// it to a recursive root and walks it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty, missing or non-directory paths,
    /// and the backend's error if the directory itself cannot be registered.
    /// Subdirectory failures are reported in the [`Expansion`] instead.
    pub fn add_directory(
        &mut self,
        path: &Utf8Path,
        recursive: bool,
        cache: &mut SnapshotCache,
    ) -> Result<(Utf8PathBuf, AddOutcome, Expansion), WatchError> {
        let (key, snapshot) = validate(path, EntryKind::Directory)?;

        let outcome = if let Some(entry) = self.entries.get_mut(&key) {
            if !recursive || entry.recursive || entry.kind != EntryKind::Directory {
                return Ok((key, AddOutcome::AlreadyWatched, Expansion::default()));
            }
            entry.recursive = true;
            AddOutcome::AlreadyWatched
        } else {
            self.backend.register(&key)?;
            self.insert(key.clone(), EntryKind::Directory, recursive, snapshot, cache);
            AddOutcome::Added
        };

        let expansion = if recursive {
            self.expand(&key, cache)
        } else {
            Expansion::default()
        };
        Ok((key, outcome, expansion))
    }

    /// Walks `root` and registers every subdirectory not yet watched.
    ///
    /// Pre-existing registrations are skipped. Unreadable parts of the tree
    /// are logged and skipped.
    pub fn expand(&mut self, root: &Utf8Path, cache: &mut SnapshotCache) -> Expansion {
        let mut expansion = Expansion::default();
        let (dirs, skipped) = discover_subdirectories(root);
        expansion.failures.extend(skipped);

        for dir in dirs {
            if self.entries.contains_key(&dir) {
                continue;
            }

            match self.backend.register(&dir) {
                Ok(()) => {
                    let snapshot = Snapshot::capture(&dir);
                    self.insert(dir.clone(), EntryKind::Directory, false, snapshot, cache);
                    expansion.added.push(dir);
                }
                Err(error) => expansion.failures.push(error),
            }
        }

        if !expansion.added.is_empty() {
            tracing::debug!(
                root = %root,
                added = expansion.added.len(),
                "Registered new subdirectories"
            );
        }
        expansion
    }

    /// Unregisters a watched file. Returns `false` if it was not watched.
    pub fn remove_file(&mut self, path: &Utf8Path, cache: &mut SnapshotCache) -> bool {
        let key = watch_key(path);
        if self.kind_of(&key) != Some(EntryKind::File) {
            return false;
        }
        self.unwatch(&key, cache);
        true
    }

    /// Unregisters a watched directory, and every watched path below it if
    /// it is a recursive root. Returns the number of paths dropped.
    ///
    /// Snapshots cached for unwatched paths below the directory are evicted
    /// as well.
    pub fn remove_directory(&mut self, path: &Utf8Path, cache: &mut SnapshotCache) -> usize {
        let key = watch_key(path);
        let Some(entry) = self.entries.get(&key) else {
            return 0;
        };
        if entry.kind != EntryKind::Directory {
            return 0;
        }

        let mut removed = 0;
        if entry.recursive {
            let prefix = descendant_prefix(&key);
            let descendants: Vec<Utf8PathBuf> = self
                .entries
                .keys()
                .filter(|candidate| is_descendant(candidate, &prefix))
                .cloned()
                .collect();
            for descendant in descendants {
                self.unwatch(&descendant, cache);
                removed += 1;
            }
        }

        self.unwatch(&key, cache);

        let prefix = descendant_prefix(&key);
        let evicted =
            cache.retain(|path| !is_descendant(path, &prefix) || self.entries.contains_key(path));
        if evicted > 0 {
            tracing::debug!(path = %key, evicted, "Evicted stale snapshots");
        }
        removed + 1
    }

    /// Unregisters everything and evicts the matching snapshots.
    pub fn clear(&mut self, cache: &mut SnapshotCache) {
        let keys: Vec<Utf8PathBuf> = self.entries.keys().cloned().collect();
        for key in keys {
            self.unwatch(&key, cache);
        }
    }

    /// Returns the kind of a watched key.
    #[must_use]
    pub fn kind_of(&self, key: &Utf8Path) -> Option<EntryKind> {
        self.entries.get(key).map(|entry| entry.kind)
    }

    /// Returns `true` if `key` is a recursive root.
    #[must_use]
    pub fn is_recursive_root(&self, key: &Utf8Path) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.recursive)
    }

    /// Returns `true` if `key` is watched.
    #[must_use]
    pub fn contains(&self, key: &Utf8Path) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the recursive roots, sorted.
    #[must_use]
    pub fn recursive_roots(&self) -> Vec<Utf8PathBuf> {
        let mut roots: Vec<Utf8PathBuf> = self
            .entries
            .values()
            .filter(|entry| entry.recursive)
            .map(|entry| entry.path.clone())
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Returns watched paths of one kind, sorted.
    #[must_use]
    pub fn paths_of(&self, kind: EntryKind) -> Vec<Utf8PathBuf> {
        let mut paths: Vec<Utf8PathBuf> = self
            .entries
            .values()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.path.clone())
            .collect();
        paths.sort_unstable();
        paths
    }

    /// Returns the number of watched paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(
        &mut self,
        key: Utf8PathBuf,
        kind: EntryKind,
        recursive: bool,
        snapshot: Option<Snapshot>,
        cache: &mut SnapshotCache,
    ) {
        if let Some(snapshot) = snapshot {
            cache.put(key.clone(), snapshot);
        }
        tracing::debug!(path = %key, kind = %kind, recursive, "Watching path");
        self.entries.insert(
            key.clone(),
            WatchEntry {
                path: key,
                kind,
                recursive,
            },
        );
    }

    fn unwatch(&mut self, key: &Utf8Path, cache: &mut SnapshotCache) {
        self.entries.remove(key);
        cache.remove(key);
        if let Err(error) = self.backend.unregister(key) {
            tracing::warn!(path = %key, error = %error, "Failed to unregister path");
        }
        tracing::debug!(path = %key, "Stopped watching path");
    }
}

/// Checks that `path` exists with the expected kind and returns its watch
/// key with a fresh snapshot.
fn validate(
    path: &Utf8Path,
    expected: EntryKind,
) -> Result<(Utf8PathBuf, Option<Snapshot>), WatchError> {
    if path.as_str().is_empty() {
        return Err(WatchError::EmptyPath);
    }

    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(WatchError::path_not_found(path));
        }
        Err(error) => return Err(WatchError::Io(error)),
    };

    match expected {
        EntryKind::File if !meta.is_file() => return Err(WatchError::NotAFile(path.to_owned())),
        EntryKind::Directory if !meta.is_dir() => {
            return Err(WatchError::NotADirectory(path.to_owned()));
        }
        _ => {}
    }

    let key = path.canonicalize_utf8()?;
    Ok((key, Some(Snapshot::from_metadata(&meta))))
}

/// Lists every directory strictly below `root`, without following links.
///
/// Directories whose path is not valid UTF-8 are returned as errors.
fn discover_subdirectories(root: &Utf8Path) -> (Vec<Utf8PathBuf>, Vec<WatchError>) {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut dirs = Vec::new();
    let mut skipped = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(root = %root, error = %error, "Skipping unreadable entry");
                continue;
            }
        };

        if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
            continue;
        }

        match Utf8PathBuf::from_path_buf(entry.into_path()) {
            Ok(dir) => dirs.push(dir),
            Err(raw) => skipped.push(WatchError::non_utf8_path(raw)),
        }
    }
    (dirs, skipped)
}
