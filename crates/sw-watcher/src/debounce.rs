//! Shared-timer debouncing of classified changes.
//!
//! The [`Coalescer`] has two modes, selected by its window:
//!
//! - **Pass-through** (window of zero): every submitted change is returned
//!   immediately as a [`CoalescedChange`]; nothing is buffered.
//! - **Buffered** (window above zero): each change upserts a pending entry
//!   for its path (last write wins) and restarts one [`DelayTimer`] shared by
//!   all paths. When the timer expires with no intervening restart, every
//!   pending entry is flushed in one [`ChangeBatch`].
//!
//! Because the timer is shared, a change to path B arriving before the window
//! for path A has elapsed postpones A's flush too: both leave together,
//! measured from B's arrival.
//!
//! Time is passed in explicitly so the owner decides how the timer is driven.
//!
//! ```text
//!  A ──┐        B ──┐
//!      ▼            ▼
//! ─────●────────────●────────────────────●───▶ time
//!      │  restart   │  restart           │
//!      └── W ──X    └──────── W ─────────┘ flush {A, B}
//! ```

use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use sw_core::ChangeType;

/// A restartable, stoppable one-shot alarm.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayTimer {
    deadline: Option<Instant>,
}

impl DelayTimer {
    /// Creates a stopped timer.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// (Re)arms the timer to fire `delay` after `now`.
    #[inline]
    pub fn restart(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Disarms the timer.
    #[inline]
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Returns the instant the timer fires at, if armed.
    #[inline]
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if the timer is armed and `now` has reached its deadline.
    #[inline]
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// A change buffered while the debounce window is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    /// Last classified change for the path.
    pub change: ChangeType,
    /// When that change was buffered.
    pub buffered_at: Instant,
}

/// A post-debounce summary of the most recent change for a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescedChange {
    /// The changed path.
    pub path: Utf8PathBuf,
    /// The last change recorded for the path.
    pub change: ChangeType,
}

/// Changes flushed together when the shared timer fires.
///
/// Inline storage for eight changes avoids allocation for typical bursts.
/// Entries are ordered by path.
pub type ChangeBatch = SmallVec<[CoalescedChange; 8]>;

/// Buffers per-path changes behind a single shared [`DelayTimer`].
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
/// use camino::Utf8Path;
/// use sw_core::ChangeType;
/// use sw_watcher::Coalescer;
///
/// let start = Instant::now();
/// let mut coalescer = Coalescer::new(Duration::from_millis(100));
///
/// let a = Utf8Path::new("/srv/a.txt");
/// assert!(coalescer.submit(a, ChangeType::FileModified, start).is_none());
/// assert!(coalescer.poll(start + Duration::from_millis(50)).is_empty());
///
/// let batch = coalescer.poll(start + Duration::from_millis(100));
/// assert_eq!(batch.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Coalescer {
    window: Duration,
    timer: DelayTimer,
    pending: FxHashMap<Utf8PathBuf, PendingChange>,
}

impl Coalescer {
    /// Creates a coalescer with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timer: DelayTimer::new(),
            pending: FxHashMap::default(),
        }
    }

    /// Returns the configured window.
    #[inline]
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` when the window is zero and changes bypass the buffer.
    #[inline]
    #[must_use]
    pub const fn is_pass_through(&self) -> bool {
        self.window.is_zero()
    }

    /// Changes the window.
    ///
    /// Switching to pass-through flushes anything still buffered and returns
    /// it. Otherwise an armed timer keeps its current deadline and the new
    /// window applies from the next restart.
    pub fn set_window(&mut self, window: Duration) -> ChangeBatch {
        self.window = window;
        if self.is_pass_through() {
            self.flush()
        } else {
            ChangeBatch::new()
        }
    }

    /// Submits a classified change.
    ///
    /// In pass-through mode the change is returned for immediate emission.
    /// In buffered mode it replaces any pending change for the same path,
    /// restarts the shared timer, and `None` is returned.
    pub fn submit(
        &mut self,
        path: &Utf8Path,
        change: ChangeType,
        now: Instant,
    ) -> Option<CoalescedChange> {
        if self.is_pass_through() {
            return Some(CoalescedChange {
                path: path.to_owned(),
                change,
            });
        }

        self.pending.insert(
            path.to_owned(),
            PendingChange {
                change,
                buffered_at: now,
            },
        );
        self.timer.restart(now, self.window);
        None
    }

    /// Flushes the buffer if the shared timer has expired at `now`.
    pub fn poll(&mut self, now: Instant) -> ChangeBatch {
        if self.timer.is_due(now) {
            self.flush()
        } else {
            ChangeBatch::new()
        }
    }

    /// Stops the timer and drains every pending change, ordered by path.
    pub fn flush(&mut self) -> ChangeBatch {
        self.timer.stop();

        let mut batch: ChangeBatch = self
            .pending
            .drain()
            .map(|(path, pending)| CoalescedChange {
                path,
                change: pending.change,
            })
            .collect();
        batch.sort_unstable_by(|a, b| a.path.cmp(&b.path));
        batch
    }

    /// Stops the timer and discards every pending change.
    pub fn cancel(&mut self) {
        self.timer.stop();
        self.pending.clear();
    }

    /// Returns when the shared timer will fire, if armed.
    #[inline]
    #[must_use]
    pub const fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Returns the pending change for `path`, if any.
    #[must_use]
    pub fn pending(&self, path: &Utf8Path) -> Option<&PendingChange> {
        self.pending.get(path)
    }

    /// Returns the number of buffered paths.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
