//! OS path-watch primitives.
//!
//! The engine talks to the operating system through the [`WatchBackend`]
//! trait: it registers and unregisters individual paths and receives
//! "path touched" notifications through its notification ingress
//! ([`ChangeWatcher::handle_notification`](crate::ChangeWatcher::handle_notification)).
//!
//! Two implementations are provided:
//!
//! - [`NotifyBackend`] - one non-recursive `notify` watch per path, forwarding
//!   notifications over a bounded tokio channel without ever blocking.
//! - [`MemoryBackend`] - records registrations in memory and can be told to
//!   reject paths; notifications are delivered by hand.
//!
//! # Notification Contract
//!
//! A notification carries either a registered path that changed itself, or
//! a registered directory whose immediate children were created, removed or
//! renamed. No ordering or de-duplication is promised.
//!
//! ```text
//! ┌──────────────────────┐  callback   ┌───────────────────┐  try_send
//! │ RecommendedWatcher   │ ──────────► │ notification_     │ ─────────────► mpsc::Receiver
//! │ (notify thread)      │             │ targets()         │                (engine task)
//! └──────────────────────┘             └─────────┬─────────┘
//!                                                │ channel full
//!                                                ▼
//!                                         overflow flag ──► take_overflow()
//! ```
//!
//! Registering a path waits for notify's thread, which also runs the
//! callback. The callback must therefore never wait for the engine: when the
//! channel is full the notification is dropped and the overflow flag is set
//! so the owner can rescan.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tokio::sync::mpsc;

use crate::error::WatchError;

/// Registration interface of an OS path-watch primitive.
///
/// Implementations watch exactly the registered path (non-recursively) and
/// report changes through whatever channel the owner wired up.
pub trait WatchBackend {
    /// Starts watching `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the primitive refuses the path.
    fn register(&mut self, path: &Utf8Path) -> Result<(), WatchError>;

    /// Stops watching `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the primitive fails to drop the watch.
    fn unregister(&mut self, path: &Utf8Path) -> Result<(), WatchError>;
}

impl<B: WatchBackend + ?Sized> WatchBackend for Box<B> {
    fn register(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        (**self).register(path)
    }

    fn unregister(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        (**self).unregister(path)
    }
}

/// A [`WatchBackend`] backed by `notify`'s recommended watcher.
///
/// Notifications are sent on the channel returned by [`NotifyBackend::new`].
/// The sender lives inside the notify callback, so the channel stays open
/// for as long as the backend does. Notifications that do not fit are
/// dropped and reported through [`take_overflow`](NotifyBackend::take_overflow).
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
    registered: Arc<RwLock<FxHashSet<Utf8PathBuf>>>,
    overflowed: Arc<AtomicBool>,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("registered", &self.registered.read().len())
            .finish_non_exhaustive()
    }
}

impl NotifyBackend {
    /// Creates the backend and its notification channel.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the OS watcher cannot be created.
    pub fn new(capacity: usize) -> Result<(Self, mpsc::Receiver<Utf8PathBuf>), WatchError> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let registered: Arc<RwLock<FxHashSet<Utf8PathBuf>>> = Arc::default();
        let overflowed = Arc::new(AtomicBool::new(false));
        let lookup = Arc::clone(&registered);
        let overflow = Arc::clone(&overflowed);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let targets = notification_targets(&event, &lookup.read());
                for path in targets {
                    match tx.try_send(path) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(path)) => {
                            if !overflow.swap(true, Ordering::AcqRel) {
                                tracing::warn!(path = %path, "Notification channel full, dropping events");
                            }
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            tracing::debug!("Notification channel closed, dropping event");
                            break;
                        }
                    }
                }
            }
            Err(error) => tracing::warn!(error = %error, "Notify watcher error"),
        })?;

        Ok((
            Self {
                watcher,
                registered,
                overflowed,
            },
            rx,
        ))
    }

    /// Returns `true` if notifications were dropped since the last call,
    /// and clears the flag.
    pub fn take_overflow(&self) -> bool {
        self.overflowed.swap(false, Ordering::AcqRel)
    }

    /// Returns the number of paths currently registered with the OS.
    #[must_use]
    pub fn registered_len(&self) -> usize {
        self.registered.read().len()
    }
}

impl WatchBackend for NotifyBackend {
    fn register(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        self.watcher
            .watch(path.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(|error| WatchError::rejected(path, error.to_string()))?;
        self.registered.write().insert(path.to_owned());
        Ok(())
    }

    fn unregister(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        self.registered.write().remove(path);
        self.watcher.unwatch(path.as_std_path())?;
        Ok(())
    }
}

/// Maps a raw notify event to the registered paths it should be reported on.
///
/// Access events are dropped. A registered path is reported when it changes
/// itself; its registered parent directory is reported as well when the
/// event adds, removes or renames the path.
#[must_use]
pub fn notification_targets(
    event: &Event,
    registered: &FxHashSet<Utf8PathBuf>,
) -> SmallVec<[Utf8PathBuf; 2]> {
    let mut targets: SmallVec<[Utf8PathBuf; 2]> = SmallVec::new();

    if matches!(event.kind, EventKind::Access(_)) {
        return targets;
    }

    let structural = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    );

    for raw in &event.paths {
        let Some(path) = Utf8Path::from_path(raw) else {
            tracing::warn!(path = %raw.display(), "Skipping non-UTF-8 path in notify event");
            continue;
        };

        if registered.contains(path) && !targets.iter().any(|t| t.as_path() == path) {
            targets.push(path.to_owned());
        }

        if structural {
            if let Some(parent) = path.parent() {
                if registered.contains(parent) && !targets.iter().any(|t| t.as_path() == parent) {
                    targets.push(parent.to_owned());
                }
            }
        }
    }

    targets
}

/// An in-memory [`WatchBackend`].
///
/// Records every registration and can be configured to reject specific
/// paths, simulating OS limits.
///
/// # Examples
///
/// ```
/// use sw_watcher::{MemoryBackend, WatchBackend};
/// use camino::Utf8Path;
///
/// let mut backend = MemoryBackend::new().reject("/srv/locked");
/// assert!(backend.register(Utf8Path::new("/srv/share")).is_ok());
/// assert!(backend.register(Utf8Path::new("/srv/locked")).is_err());
/// assert!(backend.is_registered(Utf8Path::new("/srv/share")));
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    registered: FxHashSet<Utf8PathBuf>,
    rejected: FxHashSet<Utf8PathBuf>,
    registrations: usize,
}

impl MemoryBackend {
    /// Creates a backend that accepts every path.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes future registrations of `path` fail.
    #[must_use]
    pub fn reject(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.rejected.insert(path.into());
        self
    }

    /// Returns `true` if `path` is currently registered.
    #[must_use]
    pub fn is_registered(&self, path: &Utf8Path) -> bool {
        self.registered.contains(path)
    }

    /// Returns the number of currently registered paths.
    #[must_use]
    pub fn registered_len(&self) -> usize {
        self.registered.len()
    }

    /// Returns the total number of successful `register` calls.
    #[must_use]
    pub const fn registrations(&self) -> usize {
        self.registrations
    }
}

impl WatchBackend for MemoryBackend {
    fn register(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        if self.rejected.contains(path) {
            return Err(WatchError::rejected(path, "registration rejected by backend"));
        }
        self.registered.insert(path.to_owned());
        self.registrations += 1;
        Ok(())
    }

    fn unregister(&mut self, path: &Utf8Path) -> Result<(), WatchError> {
        self.registered.remove(path);
        Ok(())
    }
}
