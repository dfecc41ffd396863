//! Change classification against the snapshot cache.
//!
//! Given a path, [`classify`] compares what is on disk now with the cached
//! [`Snapshot`] and derives a [`ChangeType`], updating the cache as a side
//! effect. The decision table is evaluated in order:
//!
//! 1. Path gone: a cached existing snapshot becomes `*Deleted` and is evicted;
//!    otherwise `Unknown` with no cache mutation.
//! 2. No usable snapshot: store one, report `*Created`.
//! 3. Permission bits differ: `PermissionsChanged`.
//! 4. Modification time differs: `*Modified`.
//! 5. File size differs: `FileModified`.
//! 6. Nothing differs: refresh anyway and report `*Modified`.
//!
//! Permissions are checked first so a simultaneous chmod and write reports
//! `PermissionsChanged`. The last branch never yields `Unknown` for a path
//! that exists, so every live notification produces a reportable change.

use camino::Utf8Path;
use sw_core::ChangeType;

use crate::snapshot::{Snapshot, SnapshotCache};

/// Classifies a notification for `path` by reading its current attributes.
pub fn classify(cache: &mut SnapshotCache, path: &Utf8Path) -> ChangeType {
    classify_observed(cache, path, Snapshot::capture(path))
}

/// Classifies a notification for `path` given already-read attributes.
///
/// `current` is `None` when the path no longer exists.
pub fn classify_observed(
    cache: &mut SnapshotCache,
    path: &Utf8Path,
    current: Option<Snapshot>,
) -> ChangeType {
    let previous = cache.get(path).copied().filter(|snapshot| snapshot.exists);

    let Some(current) = current else {
        return match previous {
            Some(previous) => {
                cache.remove(path);
                ChangeType::deleted(previous.kind())
            }
            None => ChangeType::Unknown,
        };
    };

    let change = match previous {
        None => ChangeType::created(current.kind()),
        Some(previous) if previous.permissions != current.permissions => {
            ChangeType::PermissionsChanged
        }
        Some(previous) if previous.modified != current.modified => {
            ChangeType::modified(current.kind())
        }
        Some(previous) if !current.is_directory && previous.size_bytes != current.size_bytes => {
            ChangeType::FileModified
        }
        // Spurious or duplicate notification.
        Some(_) => ChangeType::modified(current.kind()),
    };

    cache.put(path.to_owned(), current);
    change
}
