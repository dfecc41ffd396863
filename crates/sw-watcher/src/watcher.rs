//! Async driver for the change watcher.
//!
//! This module provides the [`FileWatcher`] type that runs a
//! [`ChangeWatcher`] on top of the `notify` backend inside a tokio task.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    notify thread                                │
//! │  ┌───────────────────┐    ┌──────────────────────┐              │
//! │  │ RecommendedWatcher│ -> │ notification_targets │              │
//! │  │ (non-recursive)   │    │ (registered paths)   │              │
//! │  └───────────────────┘    └──────────┬───────────┘              │
//! └──────────────────────────────────────│──────────────────────────┘
//!                                        │ try_send
//!                                        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌───────────────────────────────┐    ┌──────────────────────┐  │
//! │  │ FileWatcher::recv()           │    │ UnboundedReceiver    │  │
//! │  │ select! { notification,       │ -> │ <WatchEvent>         │  │
//! │  │          sleep_until(timer) } │    │                      │  │
//! │  └───────────────────────────────┘    └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Notifications and timer expiry are both handled inside `recv`, so the
//! engine is only ever touched from the task that owns the watcher. When the
//! notification channel overflowed, the next `recv` rescans every recursive
//! root so subdirectories announced by dropped notifications are still
//! registered.
//!
//! # Usage
//!
//! ```no_run
//! use sw_watcher::FileWatcher;
//! use sw_core::WatchConfig;
//! use camino::Utf8Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut watcher = FileWatcher::new(&WatchConfig::default())?;
//!     watcher.engine_mut().add_directory(Utf8Path::new("/srv/share"), true);
//!
//!     while let Some(event) = watcher.recv().await {
//!         println!("{event}");
//!     }
//!
//!     Ok(())
//! }
//! ```

use camino::Utf8PathBuf;
use sw_core::WatchConfig;
use tokio::sync::mpsc;

use crate::backend::NotifyBackend;
use crate::engine::ChangeWatcher;
use crate::error::WatchError;
use crate::events::WatchEvent;

/// A change watcher bound to the OS and driven by the tokio runtime.
///
/// # Lifecycle
///
/// 1. **Creation**: `FileWatcher::new()` creates the notify backend, its
///    notification channel, and the engine.
///
/// 2. **Watching**: add and remove paths through
///    [`engine_mut`](FileWatcher::engine_mut).
///
/// 3. **Event Reception**: `recv()` processes notifications and the shared
///    delay timer until an event is available.
///
/// 4. **Shutdown**: call `shutdown()` or drop the watcher. Either stops the
///    timer and unregisters every path.
pub struct FileWatcher {
    engine: ChangeWatcher<NotifyBackend>,
    notifications: mpsc::Receiver<Utf8PathBuf>,
    events: mpsc::UnboundedReceiver<WatchEvent>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Creates a watcher with nothing registered yet.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the OS watcher cannot be created.
    pub fn new(config: &WatchConfig) -> Result<Self, WatchError> {
        let (backend, notifications) = NotifyBackend::new(config.channel_capacity)?;
        let (engine, events) = ChangeWatcher::new(backend, config);

        tracing::info!(
            debounce_ms = config.debounce_ms,
            enabled = config.enabled,
            "File watcher started"
        );

        Ok(Self {
            engine,
            notifications,
            events,
        })
    }

    /// Receives the next event.
    ///
    /// Returns `None` once the notification channel has closed and every
    /// remaining event has been delivered.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        loop {
            self.recover_overflow();
            if let Ok(event) = self.events.try_recv() {
                return Some(event);
            }

            let deadline = self.engine.next_deadline();
            tokio::select! {
                notification = self.notifications.recv() => {
                    if let Some(path) = notification {
                        self.engine.handle_notification(&path);
                    } else {
                        tracing::debug!("Notification channel closed");
                        self.engine.flush_pending();
                        return self.events.try_recv().ok();
                    }
                }
                () = sleep_until(deadline) => {
                    self.engine.poll_timer(std::time::Instant::now());
                }
            }
        }
    }

    /// Processes whatever is already queued and returns the next event
    /// without waiting.
    pub fn try_recv(&mut self) -> Result<WatchEvent, mpsc::error::TryRecvError> {
        if let Ok(event) = self.events.try_recv() {
            return Ok(event);
        }

        while let Ok(path) = self.notifications.try_recv() {
            self.engine.handle_notification(&path);
        }
        self.recover_overflow();
        self.engine.poll_timer(std::time::Instant::now());
        self.events.try_recv()
    }

    /// Returns the engine.
    #[must_use]
    pub const fn engine(&self) -> &ChangeWatcher<NotifyBackend> {
        &self.engine
    }

    /// Returns the engine for adding, removing and configuring watches.
    pub fn engine_mut(&mut self) -> &mut ChangeWatcher<NotifyBackend> {
        &mut self.engine
    }

    /// Stops the timer, discards buffered changes and unregisters every
    /// path.
    pub fn shutdown(mut self) {
        self.engine.shutdown();
        tracing::info!("File watcher stopped");
    }

    fn recover_overflow(&mut self) {
        if self.engine.backend().take_overflow() {
            tracing::warn!("Notifications were dropped, rescanning recursive roots");
            self.engine.rescan_recursive_roots();
        }
    }
}

/// Sleeps until `deadline`, or forever when the timer is not armed.
async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        }
        None => std::future::pending::<()>().await,
    }
}
