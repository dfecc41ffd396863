//! Change detection with snapshot classification and shared-timer debouncing.
//!
//! This crate watches a dynamic set of files and directories and reports
//! classified, de-duplicated change events.
//!
//! # Overview
//!
//! - Keep a cache of last-observed attributes per watched path and classify
//!   every notification as created, modified, deleted or permissions changed
//! - Drop notifications whose filename matches an ignore glob
//! - Grow recursive directory watches as new subdirectories appear
//! - Coalesce bursts behind one shared delay timer
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────── ChangeWatcher ─────────────────────────┐
//! notification ──►│ enabled? ─► IgnoreFilter ─► classify ─► emit immediate          │
//!                 │                               │  ▲           │                  │
//!                 │                               ▼  │           ▼                  │
//!                 │                         SnapshotCache   WatchSet ─► Coalescer ──┼──► PathChanged
//!                 │                                            │                    │
//!                 └────────────────────────────────────────────│────────────────────┘
//!                                                              ▼
//!                                                         WatchBackend
//!                                              (NotifyBackend / MemoryBackend)
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! sw-cli ──► sw-watcher ──► sw-core
//! ```
//!
//! # Usage
//!
//! ## With the OS backend
//!
//! ```no_run
//! use sw_watcher::FileWatcher;
//! use sw_core::WatchConfig;
//! use camino::Utf8Path;
//!
//! # async fn example() -> Result<(), sw_watcher::WatchError> {
//! let mut watcher = FileWatcher::new(&WatchConfig::default())?;
//! watcher.engine_mut().add_ignore_pattern("*.tmp");
//! watcher.engine_mut().add_directory(Utf8Path::new("/srv/share"), true);
//!
//! while let Some(event) = watcher.recv().await {
//!     if event.is_coalesced() {
//!         println!("{event}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving the engine by hand
//!
//! ```
//! use std::time::Instant;
//! use sw_core::{ChangeType, WatchConfig};
//! use sw_watcher::{ChangeWatcher, MemoryBackend, WatchEvent};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let file = camino::Utf8PathBuf::from_path_buf(dir.path().join("a.txt")).unwrap();
//! std::fs::write(&file, "v1").unwrap();
//!
//! let config = WatchConfig { debounce_ms: 0, ..WatchConfig::default() };
//! let (mut watcher, mut events) = ChangeWatcher::new(MemoryBackend::new(), &config);
//! assert!(watcher.add_file(&file));
//!
//! std::fs::remove_file(&file).unwrap();
//! watcher.handle_notification_at(&file, Instant::now());
//!
//! let event = events.try_recv().unwrap();
//! assert_eq!(event.change(), Some(ChangeType::FileDeleted));
//! ```
//!
//! # Error Handling
//!
//! Watch-set operations return `bool` and report failures as
//! [`WatchEvent::WatchFailed`]. The underlying [`WatchError`] is available
//! from the lower-level [`WatchSet`]:
//!
//! ```
//! use sw_watcher::WatchError;
//!
//! fn describe(err: &WatchError) -> &'static str {
//!     if err.is_validation() { "bad request" } else { "backend failure" }
//! }
//!
//! assert_eq!(describe(&WatchError::EmptyPath), "bad request");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod backend;
pub mod classify;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod events;
pub mod filter;
pub mod paths;
pub mod snapshot;
pub mod watch_set;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export engine types
pub use backend::{MemoryBackend, NotifyBackend, WatchBackend};
pub use debounce::{ChangeBatch, CoalescedChange, Coalescer, DelayTimer, PendingChange};
pub use engine::ChangeWatcher;
pub use events::WatchEvent;
pub use filter::IgnoreFilter;
pub use snapshot::{Snapshot, SnapshotCache};
pub use watch_set::{AddOutcome, Expansion, WatchSet};

// Re-export watcher types
pub use watcher::FileWatcher;
