//! Directory watch/dispatch engine.
//!
//! Turns filesystem notifications for one directory into a concurrent,
//! at-most-once per-file pipeline, with optional write-stability checks
//! and success/failure routing.
//!
//! # Architecture
//!
//! ```text
//! Watcher
//!   - Single notify::RecommendedWatcher (non-recursive)
//!   - Event loop task, one worker task per new file
//!         |
//!   worker: claim -> stat -> lock -> paranoia -> pipeline -> route -> callback
//!                                                   |
//!                                  PostAction / RunAction / EchoAction
//! ```

mod action;
pub mod actions;
mod engine;
mod error;
mod lock;
mod pipeline;
mod report;
mod routing;
mod stability;

pub use action::Action;
pub use engine::{WatchConfig, WatchConfigBuilder, WatchHandle, Watcher};
pub use error::{ActionError, WatchError};
pub use lock::FileLock;
pub use pipeline::Outcome;
pub use report::{FileHandledCallback, Reporter, Reporting};
pub use routing::{Routed, Router, move_file};
pub use stability::{POLL_INTERVAL, Paranoia, wait_until_stable};

/// Run the action pipeline on one file (no locking or routing).
pub use pipeline::run as run_pipeline;
