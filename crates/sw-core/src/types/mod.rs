//! Domain types shared across the sharewatch workspace.
//!
//! # Module Organization
//!
//! - [`change`] - Classified change kinds reported by the engine
//! - [`entry`] - The kind of a watched path
//!
//! All public types are also re-exported at the crate root:
//!
//! ```
//! use sw_core::{ChangeType, EntryKind};
//! ```

mod change;
mod entry;

pub use change::ChangeType;
pub use entry::EntryKind;
