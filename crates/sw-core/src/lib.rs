//! Core types, configuration, and errors for the sharewatch workspace.
//!
//! This crate provides the foundational types shared by the change-detection
//! engine and the command-line front end:
//!
//! - [`ChangeType`] - the classified kind of a filesystem change
//! - [`EntryKind`] - whether a watched path is a file or a directory
//! - [`Config`], [`WatchConfig`], [`OutputConfig`] - configuration structures
//! - [`ConfigError`] - configuration loading and validation failures
//!
//! # Crate Dependencies
//!
//! ```text
//! sw-cli ──► sw-watcher ──► sw-core
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, OutputConfig, OutputFormat, WatchConfig};
pub use error::ConfigError;
pub use types::{ChangeType, EntryKind};
