//! Error types for the watch/dispatch engine.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that stop a watch (setup failures and terminal loop errors).
///
/// Per-file failures never surface as a `WatchError`; they are logged
/// through the reporting gates and the loop carries on.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("File system event error: {details}")]
    EventError { details: String },

    #[error("Invalid watch configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,

    #[error("Watch loop ended abnormally: {reason}")]
    LoopAborted { reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}

/// Errors raised inside an action while processing a single file.
///
/// Actions turn these into a `false` result after reporting them.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server answered {status}")]
    Status { status: reqwest::StatusCode },

    #[error("Cannot start {cmd}: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {cmd} failed with {status}")]
    Exit { cmd: String, status: ExitStatus },
}
