//! The change watcher facade.
//!
//! [`ChangeWatcher`] owns the watch set, snapshot cache, ignore filter and
//! coalescer, and mediates every mutation of them. It is driven from a single
//! logical thread: notifications enter through
//! [`handle_notification`](ChangeWatcher::handle_notification) and the shared
//! delay timer is fired through [`poll_timer`](ChangeWatcher::poll_timer).
//!
//! # Notification Pipeline
//!
//! ```text
//! handle_notification(path)
//!   │
//!   ├─ detection disabled? ──► drop
//!   ├─ filename ignored?   ──► drop
//!   ▼
//! classify (updates cache)
//!   ▼
//! emit FileChanged / DirectoryChanged
//!   ▼
//! recursive root? ──► re-walk, register new subdirectories
//!   ▼
//! Coalescer ──► PathChanged (now, or when the shared timer fires)
//! ```

use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use sw_core::{ChangeType, EntryKind, WatchConfig};
use tokio::sync::mpsc;

use crate::backend::WatchBackend;
use crate::classify::classify;
use crate::debounce::{ChangeBatch, Coalescer};
use crate::error::WatchError;
use crate::events::WatchEvent;
use crate::filter::IgnoreFilter;
use crate::paths::watch_key;
use crate::snapshot::{Snapshot, SnapshotCache};
use crate::watch_set::{AddOutcome, Expansion, WatchSet};

/// Watches a dynamic set of files and directories and reports classified,
/// debounced changes.
///
/// Events are sent on the unbounded channel returned by
/// [`ChangeWatcher::new`]. Dropping the watcher tears it down as
/// [`shutdown`](ChangeWatcher::shutdown) does.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
/// use sw_core::WatchConfig;
/// use sw_watcher::{ChangeWatcher, MemoryBackend, WatchEvent};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = camino::Utf8Path::from_path(dir.path()).unwrap();
///
/// let config = WatchConfig { debounce_ms: 50, ..WatchConfig::default() };
/// let (mut watcher, mut events) = ChangeWatcher::new(MemoryBackend::new(), &config);
/// assert!(watcher.add_directory(path, false));
///
/// let start = Instant::now();
/// std::fs::write(path.join("a.txt"), "hello").unwrap();
/// watcher.handle_notification_at(path, start);
/// assert!(matches!(events.try_recv(), Ok(WatchEvent::DirectoryChanged { .. })));
///
/// watcher.poll_timer(start + Duration::from_millis(50));
/// assert!(matches!(events.try_recv(), Ok(WatchEvent::PathChanged { .. })));
/// ```
pub struct ChangeWatcher<B: WatchBackend> {
    watch_set: WatchSet<B>,
    cache: SnapshotCache,
    ignore: IgnoreFilter,
    coalescer: Coalescer,
    enabled: bool,
    events: mpsc::UnboundedSender<WatchEvent>,
}

impl<B: WatchBackend + std::fmt::Debug> std::fmt::Debug for ChangeWatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("backend", self.watch_set.backend())
            .field("watched", &self.watch_set.len())
            .field("enabled", &self.enabled)
            .field("debounce", &self.coalescer.window())
            .field("pending", &self.coalescer.pending_len())
            .finish_non_exhaustive()
    }
}

impl<B: WatchBackend> ChangeWatcher<B> {
    /// Creates a watcher on top of `backend` and returns it together with
    /// its event receiver.
    ///
    /// Ignore patterns from `config` that fail to compile are logged and
    /// skipped.
    pub fn new(backend: B, config: &WatchConfig) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut ignore = IgnoreFilter::new();
        for glob in &config.ignore_patterns {
            if let Err(error) = ignore.add(glob) {
                tracing::warn!(error = %error, "Skipping ignore pattern");
            }
        }

        let watcher = Self {
            watch_set: WatchSet::new(backend),
            cache: SnapshotCache::new(),
            ignore,
            coalescer: Coalescer::new(Duration::from_millis(config.debounce_ms)),
            enabled: config.enabled,
            events: tx,
        };
        (watcher, rx)
    }

    // -------------------------------------------------------------------------
    // Watch set
    // -------------------------------------------------------------------------

    /// Starts watching a regular file.
    ///
    /// Returns `true` if the file is watched afterwards, including when it
    /// already was. On failure a [`WatchEvent::WatchFailed`] is emitted and
    /// nothing else changes.
    pub fn add_file(&mut self, path: &Utf8Path) -> bool {
        match self.watch_set.add_file(path, &mut self.cache) {
            Ok((key, AddOutcome::Added)) => {
                tracing::info!(path = %key, "Watching file");
                true
            }
            Ok((_, AddOutcome::AlreadyWatched)) => true,
            Err(error) => {
                self.report_failure(path, &error);
                false
            }
        }
    }

    /// Starts watching a directory, and its whole subdirectory tree when
    /// `recursive` is set.
    ///
    /// Returns `true` if the directory itself is watched afterwards.
    /// Subdirectories that cannot be registered are reported through
    /// [`WatchEvent::WatchFailed`] without failing the call.
    pub fn add_directory(&mut self, path: &Utf8Path, recursive: bool) -> bool {
        match self.watch_set.add_directory(path, recursive, &mut self.cache) {
            Ok((key, outcome, expansion)) => {
                if outcome == AddOutcome::Added {
                    tracing::info!(
                        path = %key,
                        recursive,
                        subdirectories = expansion.added.len(),
                        "Watching directory"
                    );
                } else if recursive && !expansion.is_empty() {
                    tracing::info!(path = %key, "Directory promoted to recursive watch");
                }
                self.report_expansion(&key, expansion);
                true
            }
            Err(error) => {
                self.report_failure(path, &error);
                false
            }
        }
    }

    /// Stops watching a file.
    ///
    /// Removing a path that is not watched as a file is a successful no-op.
    /// Returns `false` only for an empty path.
    pub fn remove_file(&mut self, path: &Utf8Path) -> bool {
        if path.as_str().is_empty() {
            return false;
        }
        if self.watch_set.remove_file(path, &mut self.cache) {
            tracing::info!(path = %path, "Stopped watching file");
        }
        true
    }

    /// Stops watching a directory, along with every watched path below it
    /// if it was added recursively.
    ///
    /// Removing a path that is not watched as a directory is a successful
    /// no-op. Returns `false` only for an empty path.
    pub fn remove_directory(&mut self, path: &Utf8Path) -> bool {
        if path.as_str().is_empty() {
            return false;
        }
        let removed = self.watch_set.remove_directory(path, &mut self.cache);
        if removed > 0 {
            tracing::info!(path = %path, removed, "Stopped watching directory");
        }
        true
    }

    /// Returns `true` if `path` is in the watch set.
    #[must_use]
    pub fn is_watching(&self, path: &Utf8Path) -> bool {
        !path.as_str().is_empty() && self.watch_set.contains(&watch_key(path))
    }

    /// Returns the watched files, sorted.
    #[must_use]
    pub fn watched_files(&self) -> Vec<Utf8PathBuf> {
        self.watch_set.paths_of(EntryKind::File)
    }

    /// Returns the watched directories, sorted.
    #[must_use]
    pub fn watched_directories(&self) -> Vec<Utf8PathBuf> {
        self.watch_set.paths_of(EntryKind::Directory)
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Sets the debounce window in milliseconds. Negative values clamp to 0.
    ///
    /// A window of 0 emits coalesced events immediately; switching to it
    /// flushes anything still buffered.
    pub fn set_debounce_interval(&mut self, ms: i64) {
        let ms = u64::try_from(ms).unwrap_or(0);
        let flushed = self.coalescer.set_window(Duration::from_millis(ms));
        tracing::debug!(debounce_ms = ms, "Debounce interval changed");
        self.emit_batch(flushed);
    }

    /// Returns the debounce window.
    #[must_use]
    pub const fn debounce_interval(&self) -> Duration {
        self.coalescer.window()
    }

    /// Enables or disables change detection.
    ///
    /// While disabled, notifications are dropped before classification and
    /// OS registrations are left untouched. Disabling also stops the shared
    /// timer and discards buffered changes.
    pub fn set_change_detection_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            self.coalescer.cancel();
        }
        tracing::info!(enabled, "Change detection toggled");
    }

    /// Returns `true` if change detection is enabled.
    #[must_use]
    pub const fn is_change_detection_enabled(&self) -> bool {
        self.enabled
    }

    /// Adds a filename glob. Returns `true` if it was newly added.
    ///
    /// Duplicates are a no-op. Globs that cannot be compiled are logged and
    /// rejected.
    pub fn add_ignore_pattern(&mut self, glob: &str) -> bool {
        match self.ignore.add(glob) {
            Ok(added) => added,
            Err(error) => {
                tracing::warn!(error = %error, "Rejected ignore pattern");
                false
            }
        }
    }

    /// Removes a glob by exact match. Returns `true` if it was present.
    pub fn remove_ignore_pattern(&mut self, glob: &str) -> bool {
        self.ignore.remove(glob)
    }

    /// Removes every ignore glob.
    pub fn clear_ignore_patterns(&mut self) {
        self.ignore.clear();
    }

    /// Returns the ignore globs in insertion order.
    pub fn ignore_patterns(&self) -> impl Iterator<Item = &str> {
        self.ignore.patterns()
    }

    // -------------------------------------------------------------------------
    // Notification ingress and timer
    // -------------------------------------------------------------------------

    /// Handles a "path touched" notification from the OS primitive.
    pub fn handle_notification(&mut self, path: &Utf8Path) {
        self.handle_notification_at(path, Instant::now());
    }

    /// Handles a notification as if it arrived at `now`.
    pub fn handle_notification_at(&mut self, path: &Utf8Path, now: Instant) {
        if !self.enabled {
            tracing::trace!(path = %path, "Change detection disabled, dropping notification");
            return;
        }
        if path.as_str().is_empty() {
            return;
        }
        if self.ignore.should_ignore(path) {
            tracing::trace!(path = %path, "Ignored notification");
            return;
        }

        let key = watch_key(path);
        let change = classify(&mut self.cache, &key);
        tracing::debug!(path = %key, change = %change, "Classified change");

        self.emit(self.immediate_event(&key, change));

        if self.watch_set.is_recursive_root(&key) && !change.is_deletion() {
            let expansion = self.watch_set.expand(&key, &mut self.cache);
            self.report_expansion(&key, expansion);
        }

        if let Some(coalesced) = self.coalescer.submit(&key, change, now) {
            self.emit(coalesced.into());
        }
    }

    /// Fires the shared delay timer if it is due at `now`.
    ///
    /// Returns the number of coalesced events emitted.
    pub fn poll_timer(&mut self, now: Instant) -> usize {
        let batch = self.coalescer.poll(now);
        self.emit_batch(batch)
    }

    /// Flushes every buffered change regardless of the timer.
    ///
    /// Returns the number of coalesced events emitted.
    pub fn flush_pending(&mut self) -> usize {
        let batch = self.coalescer.flush();
        self.emit_batch(batch)
    }

    /// Returns when the shared delay timer will fire, if armed.
    #[must_use]
    pub const fn next_deadline(&self) -> Option<Instant> {
        self.coalescer.next_deadline()
    }

    /// Returns the number of buffered paths.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.coalescer.pending_len()
    }

    /// Re-walks every recursive root and registers subdirectories that are
    /// not watched yet.
    ///
    /// Used after notifications were lost, since the dropped ones may have
    /// announced new subdirectories. Returns the number of paths added.
    pub fn rescan_recursive_roots(&mut self) -> usize {
        if !self.enabled {
            return 0;
        }

        let mut added = 0;
        for root in self.watch_set.recursive_roots() {
            let expansion = self.watch_set.expand(&root, &mut self.cache);
            added += expansion.added.len();
            self.report_expansion(&root, expansion);
        }
        tracing::info!(added, "Rescanned recursive roots");
        added
    }

    // -------------------------------------------------------------------------
    // Inspection and teardown
    // -------------------------------------------------------------------------

    /// Returns the cached snapshot for `path`.
    #[must_use]
    pub fn snapshot(&self, path: &Utf8Path) -> Option<&Snapshot> {
        self.cache.get(&watch_key(path))
    }

    /// Returns the watch backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        self.watch_set.backend()
    }

    /// Stops the timer, discards buffered changes, unregisters every path
    /// and clears the cache. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.coalescer.cancel();
        if !self.watch_set.is_empty() {
            tracing::info!(watched = self.watch_set.len(), "Stopping change watcher");
        }
        self.watch_set.clear(&mut self.cache);
        self.cache.clear();
    }

    fn immediate_event(&self, key: &Utf8Path, change: ChangeType) -> WatchEvent {
        let is_directory = match self.watch_set.kind_of(key) {
            Some(kind) => kind.is_directory(),
            None => change.is_directory(),
        };
        let path = key.to_owned();
        if is_directory {
            WatchEvent::DirectoryChanged { path, change }
        } else {
            WatchEvent::FileChanged { path, change }
        }
    }

    fn report_failure(&self, path: &Utf8Path, error: &WatchError) {
        tracing::warn!(path = %path, error = %error, "Failed to watch path");
        self.emit(WatchEvent::WatchFailed {
            path: path.to_owned(),
            reason: error.to_string(),
        });
    }

    fn report_expansion(&self, root: &Utf8Path, expansion: Expansion) {
        for error in expansion.failures {
            if error.is_recoverable() {
                tracing::debug!(root = %root, error = %error, "Skipped subdirectory");
            } else {
                tracing::warn!(root = %root, error = %error, "Failed to watch subdirectory");
            }
            let path = error.path().map_or_else(|| root.to_owned(), Clone::clone);
            self.emit(WatchEvent::WatchFailed {
                path,
                reason: error.to_string(),
            });
        }
    }

    fn emit_batch(&self, batch: ChangeBatch) -> usize {
        let count = batch.len();
        if count > 0 {
            tracing::debug!(count, "Flushing coalesced changes");
        }
        for coalesced in batch {
            self.emit(coalesced.into());
        }
        count
    }

    fn emit(&self, event: WatchEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.events.send(event);
    }
}

impl<B: WatchBackend> Drop for ChangeWatcher<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::fs;
    use tempfile::TempDir;

    const WINDOW_MS: u64 = 100;

    struct Fixture {
        _dir: TempDir,
        root: Utf8PathBuf,
        watcher: ChangeWatcher<MemoryBackend>,
        events: mpsc::UnboundedReceiver<WatchEvent>,
    }

    impl Fixture {
        fn drain(&mut self) -> Vec<WatchEvent> {
            let mut drained = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                drained.push(event);
            }
            drained
        }
    }

    fn fixture(debounce_ms: u64) -> Fixture {
        fixture_with(MemoryBackend::new(), debounce_ms)
    }

    fn fixture_with(backend: MemoryBackend, debounce_ms: u64) -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("UTF-8")
            .canonicalize_utf8()
            .expect("canonical");
        let config = WatchConfig {
            debounce_ms,
            ..WatchConfig::default()
        };
        let (watcher, events) = ChangeWatcher::new(backend, &config);
        Fixture {
            _dir: dir,
            root,
            watcher,
            events,
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn changes(events: &[WatchEvent]) -> Vec<(&'static str, ChangeType)> {
        events
            .iter()
            .filter_map(|event| event.change().map(|change| (event.label(), change)))
            .collect()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut fx = fixture(0);
        let file = fx.root.join("a.txt");
        fs::write(&file, "a").expect("write");
        let root = fx.root.clone();

        assert!(fx.watcher.add_file(&file));
        assert!(fx.watcher.add_file(&file));
        assert!(fx.watcher.add_directory(&root, false));
        assert!(fx.watcher.add_directory(&root, false));

        assert_eq!(fx.watcher.watched_files(), vec![file]);
        assert_eq!(fx.watcher.watched_directories(), vec![root]);
        assert_eq!(fx.watcher.backend().registrations(), 2);
        assert!(fx.drain().is_empty());
    }

    #[test]
    fn test_add_remove_round_trip() {
        let mut fx = fixture(0);
        let file = fx.root.join("a.txt");
        fs::write(&file, "a").expect("write");
        let root = fx.root.clone();

        assert!(!fx.watcher.is_watching(&file));
        assert!(fx.watcher.add_file(&file));
        assert!(fx.watcher.is_watching(&file));
        assert!(fx.watcher.remove_file(&file));
        assert!(!fx.watcher.is_watching(&file));
        assert!(fx.watcher.remove_file(&file));

        assert!(fx.watcher.add_directory(&root, true));
        assert!(fx.watcher.is_watching(&root));
        assert!(fx.watcher.remove_directory(&root));
        assert!(!fx.watcher.is_watching(&root));
        assert_eq!(fx.watcher.backend().registered_len(), 0);
    }

    #[test]
    fn test_relative_and_absolute_spellings_match() {
        let mut fx = fixture(0);
        fs::create_dir(fx.root.join("sub")).expect("mkdir");
        let dotted = fx.root.join("sub/../sub");

        assert!(fx.watcher.add_directory(&dotted, false));
        assert!(fx.watcher.is_watching(&fx.root.join("sub")));
    }

    #[test]
    fn test_failed_add_reports_watch_failed() {
        let mut fx = fixture(0);
        let missing = fx.root.join("missing.txt");

        assert!(!fx.watcher.add_file(&missing));
        let events = fx.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            WatchEvent::WatchFailed {
                path: missing.clone(),
                reason: format!("path does not exist: {missing}"),
            }
        );

        let root = fx.root.clone();
        assert!(!fx.watcher.add_file(&root));
        assert!(matches!(
            fx.drain().as_slice(),
            [WatchEvent::WatchFailed { .. }]
        ));
        assert!(!fx.watcher.is_watching(&root));
    }

    #[test]
    fn test_empty_path_fails_without_side_effects() {
        let mut fx = fixture(0);
        assert!(!fx.watcher.add_file(Utf8Path::new("")));
        assert!(!fx.watcher.add_directory(Utf8Path::new(""), true));
        assert!(!fx.watcher.remove_file(Utf8Path::new("")));
        assert!(!fx.watcher.remove_directory(Utf8Path::new("")));
        assert!(!fx.watcher.is_watching(Utf8Path::new("")));

        let failed = WatchEvent::WatchFailed {
            path: Utf8PathBuf::new(),
            reason: "path is empty".to_owned(),
        };
        assert_eq!(fx.drain(), vec![failed.clone(), failed]);
        assert!(fx.watcher.watched_files().is_empty());
        assert!(fx.watcher.watched_directories().is_empty());
        assert_eq!(fx.watcher.backend().registrations(), 0);
    }

    #[test]
    fn test_backend_rejection_fails_add() {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("UTF-8")
            .canonicalize_utf8()
            .expect("canonical");
        let (mut watcher, mut events) = ChangeWatcher::new(
            MemoryBackend::new().reject(root.clone()),
            &WatchConfig::default(),
        );

        assert!(!watcher.add_directory(&root, false));
        assert!(!watcher.is_watching(&root));
        let Ok(WatchEvent::WatchFailed { reason, .. }) = events.try_recv() else {
            panic!("expected WatchFailed");
        };
        assert!(reason.starts_with("failed to watch"));
    }

    #[test]
    fn test_modification_classified_and_cached() {
        let mut fx = fixture(0);
        let file = fx.root.join("a.txt");
        fs::write(&file, "a").expect("write");
        assert!(fx.watcher.add_file(&file));

        fs::write(&file, "a much longer body").expect("write");
        fx.watcher.handle_notification(&file);

        assert_eq!(
            changes(&fx.drain()),
            vec![
                ("file", ChangeType::FileModified),
                ("changed", ChangeType::FileModified),
            ]
        );
        let snapshot = fx.watcher.snapshot(&file).expect("cached");
        assert_eq!(snapshot.size_bytes, 18);
        let modified = fs::metadata(&file).expect("metadata").modified().ok();
        assert!(modified.is_some());
        assert_eq!(snapshot.modified, modified);
    }

    #[test]
    fn test_deletion_then_unknown() {
        let mut fx = fixture(0);
        let file = fx.root.join("a.txt");
        fs::write(&file, "a").expect("write");
        assert!(fx.watcher.add_file(&file));

        fs::remove_file(&file).expect("rm");
        fx.watcher.handle_notification(&file);
        assert_eq!(
            changes(&fx.drain()),
            vec![
                ("file", ChangeType::FileDeleted),
                ("changed", ChangeType::FileDeleted),
            ]
        );
        assert!(fx.watcher.snapshot(&file).is_none());

        fx.watcher.handle_notification(&file);
        assert_eq!(
            changes(&fx.drain()),
            vec![("file", ChangeType::Unknown), ("changed", ChangeType::Unknown)]
        );
        assert!(fx.watcher.snapshot(&file).is_none());
        assert!(fx.watcher.is_watching(&file));
    }

    #[test]
    fn test_directory_deletion() {
        let mut fx = fixture(0);
        let sub = fx.root.join("sub");
        fs::create_dir(&sub).expect("mkdir");
        assert!(fx.watcher.add_directory(&sub, false));

        fs::remove_dir(&sub).expect("rmdir");
        fx.watcher.handle_notification(&sub);
        assert_eq!(
            changes(&fx.drain()),
            vec![
                ("directory", ChangeType::DirectoryDeleted),
                ("changed", ChangeType::DirectoryDeleted),
            ]
        );
    }

    #[test]
    fn test_burst_coalesces_to_last_change() {
        let mut fx = fixture(WINDOW_MS);
        let root = fx.root.clone();
        assert!(fx.watcher.add_directory(&root, false));
        let scratch = root.join("report.txt");
        let start = Instant::now();

        fs::write(&scratch, "draft").expect("write");
        fx.watcher.handle_notification_at(&scratch, start);
        fs::write(&scratch, "final version").expect("write");
        fx.watcher.handle_notification_at(&scratch, start + ms(10));
        fs::remove_file(&scratch).expect("rm");
        fx.watcher.handle_notification_at(&scratch, start + ms(20));

        let immediate = fx.drain();
        assert_eq!(
            changes(&immediate),
            vec![
                ("file", ChangeType::FileCreated),
                ("file", ChangeType::FileModified),
                ("file", ChangeType::FileDeleted),
            ]
        );
        assert_eq!(fx.watcher.pending_len(), 1);

        assert_eq!(fx.watcher.poll_timer(start + ms(119)), 0);
        assert_eq!(fx.watcher.poll_timer(start + ms(120)), 1);
        assert_eq!(
            fx.drain(),
            vec![WatchEvent::PathChanged {
                path: scratch,
                change: ChangeType::FileDeleted,
            }]
        );
    }

    #[test]
    fn test_shared_timer_flushes_paths_together() {
        let mut fx = fixture(WINDOW_MS);
        let a = fx.root.join("a.txt");
        let b = fx.root.join("b.txt");
        fs::write(&a, "a").expect("write");
        fs::write(&b, "b").expect("write");
        assert!(fx.watcher.add_file(&a));
        assert!(fx.watcher.add_file(&b));
        let start = Instant::now();

        fx.watcher.handle_notification_at(&a, start);
        fx.watcher.handle_notification_at(&b, start + ms(80));
        fx.drain();

        assert_eq!(fx.watcher.poll_timer(start + ms(100)), 0);
        assert_eq!(fx.watcher.next_deadline(), Some(start + ms(180)));
        assert_eq!(fx.watcher.poll_timer(start + ms(180)), 2);

        let flushed: Vec<_> = fx.drain().iter().map(|e| e.path().to_owned()).collect();
        assert_eq!(flushed, vec![a, b]);
        assert!(fx.watcher.next_deadline().is_none());
    }

    #[test]
    fn test_ignored_names_produce_no_events() {
        let mut fx = fixture(0);
        let root = fx.root.clone();
        assert!(fx.watcher.add_directory(&root, false));
        assert!(fx.watcher.add_ignore_pattern("*.tmp"));

        let scratch = root.join("scratch.tmp");
        let keep = root.join("keep.txt");
        fs::write(&scratch, "x").expect("write");
        fs::write(&keep, "x").expect("write");

        fx.watcher.handle_notification(&scratch);
        fx.watcher.handle_notification(&keep);

        let events = fx.drain();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.path() == keep.as_path()));
        assert!(fx.watcher.snapshot(&scratch).is_none());
    }

    #[test]
    fn test_ignore_pattern_management() {
        let mut fx = fixture(0);
        assert!(fx.watcher.add_ignore_pattern("*.tmp"));
        assert!(!fx.watcher.add_ignore_pattern("*.tmp"));
        assert!(fx.watcher.add_ignore_pattern(".*"));
        assert_eq!(fx.watcher.ignore_patterns().collect::<Vec<_>>(), vec!["*.tmp", ".*"]);

        assert!(fx.watcher.remove_ignore_pattern("*.tmp"));
        assert!(!fx.watcher.remove_ignore_pattern("*.tmp"));
        fx.watcher.clear_ignore_patterns();
        assert_eq!(fx.watcher.ignore_patterns().count(), 0);
    }

    #[test]
    fn test_config_ignore_patterns_applied() {
        let config = WatchConfig {
            ignore_patterns: vec!["*.swp".to_owned()],
            ..WatchConfig::default()
        };
        let (watcher, _events) = ChangeWatcher::new(MemoryBackend::new(), &config);
        assert_eq!(watcher.ignore_patterns().collect::<Vec<_>>(), vec!["*.swp"]);
        assert_eq!(watcher.debounce_interval(), ms(config.debounce_ms));
    }

    #[test]
    fn test_recursive_expansion_on_notification() {
        let mut fx = fixture(0);
        let root = fx.root.clone();
        fs::create_dir(root.join("sub")).expect("mkdir");

        assert!(fx.watcher.add_directory(&root, true));
        assert_eq!(
            fx.watcher.watched_directories(),
            vec![root.clone(), root.join("sub")]
        );

        fs::create_dir(root.join("newsub")).expect("mkdir");
        fx.watcher.handle_notification(&root);

        assert_eq!(
            fx.watcher.watched_directories(),
            vec![root.clone(), root.join("newsub"), root.join("sub")]
        );
        assert!(fx.watcher.snapshot(&root.join("newsub")).is_some());
        assert_eq!(
            changes(&fx.drain()),
            vec![
                ("directory", ChangeType::DirectoryModified),
                ("changed", ChangeType::DirectoryModified),
            ]
        );
    }

    #[test]
    fn test_subdirectory_notifications_do_not_expand() {
        let mut fx = fixture(0);
        let root = fx.root.clone();
        fs::create_dir(root.join("sub")).expect("mkdir");
        assert!(fx.watcher.add_directory(&root, true));

        fs::create_dir(root.join("sub/nested")).expect("mkdir");
        fx.watcher.handle_notification(&root.join("sub"));
        assert!(!fx.watcher.is_watching(&root.join("sub/nested")));

        fx.watcher.handle_notification(&root);
        assert!(fx.watcher.is_watching(&root.join("sub/nested")));
    }

    #[test]
    fn test_rescan_registers_missed_subdirectories() {
        let mut fx = fixture(0);
        let root = fx.root.clone();
        let plain = root.join("plain");
        fs::create_dir(&plain).expect("mkdir");
        assert!(fx.watcher.add_directory(&root, true));
        fx.drain();

        // Created without any notification reaching the engine.
        fs::create_dir_all(root.join("late/nested")).expect("mkdir");
        assert_eq!(fx.watcher.rescan_recursive_roots(), 2);
        assert!(fx.watcher.is_watching(&root.join("late")));
        assert!(fx.watcher.is_watching(&root.join("late/nested")));
        assert!(fx.drain().is_empty());

        assert_eq!(fx.watcher.rescan_recursive_roots(), 0);
        fx.watcher.set_change_detection_enabled(false);
        fs::create_dir(root.join("later")).expect("mkdir");
        assert_eq!(fx.watcher.rescan_recursive_roots(), 0);
    }

    #[test]
    fn test_remove_directory_evicts_notified_children() {
        let mut fx = fixture(0);
        let root = fx.root.clone();
        assert!(fx.watcher.add_directory(&root, false));

        let child = root.join("child.txt");
        fs::write(&child, "c").expect("write");
        fx.watcher.handle_notification(&child);
        assert!(fx.watcher.snapshot(&child).is_some());

        assert!(fx.watcher.remove_directory(&root));
        assert!(fx.watcher.snapshot(&child).is_none());
        assert!(fx.watcher.snapshot(&root).is_none());
    }

    #[test]
    fn test_recursive_remove_spares_sibling_prefix() {
        let mut fx = fixture(0);
        fs::create_dir_all(fx.root.join("data/sub")).expect("mkdir");
        fs::create_dir_all(fx.root.join("data2")).expect("mkdir");
        let data = fx.root.join("data");
        let data2 = fx.root.join("data2");

        assert!(fx.watcher.add_directory(&data, true));
        assert!(fx.watcher.add_directory(&data2, false));
        assert!(fx.watcher.remove_directory(&data));

        assert_eq!(fx.watcher.watched_directories(), vec![data2]);
    }

    #[test]
    fn test_rejected_subdirectory_reported_but_add_succeeds() {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("UTF-8")
            .canonicalize_utf8()
            .expect("canonical");
        let locked = root.join("locked");
        fs::create_dir(&locked).expect("mkdir");

        let (mut watcher, mut events) = ChangeWatcher::new(
            MemoryBackend::new().reject(locked.clone()),
            &WatchConfig::default(),
        );
        assert!(watcher.add_directory(&root, true));
        assert!(!watcher.is_watching(&locked));

        let Ok(WatchEvent::WatchFailed { path, .. }) = events.try_recv() else {
            panic!("expected WatchFailed");
        };
        assert_eq!(path, locked);
    }

    #[test]
    fn test_disabled_detection_is_silent() {
        let mut fx = fixture(0);
        let file = fx.root.join("a.txt");
        fs::write(&file, "a").expect("write");
        assert!(fx.watcher.add_file(&file));
        let before = fx.watcher.snapshot(&file).copied();

        fx.watcher.set_change_detection_enabled(false);
        assert!(!fx.watcher.is_change_detection_enabled());
        fs::write(&file, "a longer body").expect("write");
        fx.watcher.handle_notification(&file);

        assert!(fx.drain().is_empty());
        assert!(fx.watcher.is_watching(&file));
        assert!(fx.watcher.backend().is_registered(&file));
        assert_eq!(fx.watcher.snapshot(&file).copied(), before);

        fx.watcher.set_change_detection_enabled(true);
        fx.watcher.handle_notification(&file);
        assert_eq!(fx.drain().len(), 2);
    }

    #[test]
    fn test_disabling_discards_pending() {
        let mut fx = fixture(WINDOW_MS);
        let file = fx.root.join("a.txt");
        fs::write(&file, "a").expect("write");
        assert!(fx.watcher.add_file(&file));
        let start = Instant::now();

        fx.watcher.handle_notification_at(&file, start);
        assert_eq!(fx.watcher.pending_len(), 1);

        fx.watcher.set_change_detection_enabled(false);
        assert_eq!(fx.watcher.pending_len(), 0);
        assert!(fx.watcher.next_deadline().is_none());
        assert_eq!(fx.watcher.poll_timer(start + ms(1000)), 0);
    }

    #[test]
    fn test_zero_interval_flushes_and_passes_through() {
        let mut fx = fixture(WINDOW_MS);
        let file = fx.root.join("a.txt");
        fs::write(&file, "a").expect("write");
        assert!(fx.watcher.add_file(&file));

        fx.watcher.handle_notification(&file);
        fx.drain();

        fx.watcher.set_debounce_interval(-5);
        assert_eq!(fx.watcher.debounce_interval(), Duration::ZERO);
        assert!(matches!(
            fx.drain().as_slice(),
            [WatchEvent::PathChanged { .. }]
        ));

        fx.watcher.handle_notification(&file);
        let events = fx.drain();
        assert_eq!(events.len(), 2);
        assert!(events[1].is_coalesced());
    }

    #[test]
    fn test_flush_pending_forces_emission() {
        let mut fx = fixture(WINDOW_MS);
        let file = fx.root.join("a.txt");
        fs::write(&file, "a").expect("write");
        assert!(fx.watcher.add_file(&file));

        fx.watcher.handle_notification(&file);
        fx.drain();
        assert_eq!(fx.watcher.flush_pending(), 1);
        assert_eq!(fx.watcher.flush_pending(), 0);
    }

    #[test]
    fn test_shutdown_unregisters_everything() {
        let mut fx = fixture(WINDOW_MS);
        let root = fx.root.clone();
        fs::create_dir(root.join("sub")).expect("mkdir");
        assert!(fx.watcher.add_directory(&root, true));
        fx.watcher.handle_notification(&root);

        fx.watcher.shutdown();
        assert_eq!(fx.watcher.backend().registered_len(), 0);
        assert!(fx.watcher.watched_directories().is_empty());
        assert_eq!(fx.watcher.pending_len(), 0);
        assert!(fx.watcher.snapshot(&root).is_none());

        fx.watcher.shutdown();
    }
}
