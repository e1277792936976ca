//! Watch a directory and hand every new file to a chain of actions.
//!
//! ```no_run
//! use springboard::{EchoAction, WatchConfig, Watcher};
//!
//! # async fn demo() -> Result<(), springboard::WatchError> {
//! let config = WatchConfig::builder("/srv/inbox")
//!     .action(EchoAction::new())
//!     .archive_dir("/srv/done")
//!     .build()?;
//! Watcher::new(config).run().await
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod logging;
pub mod watcher;

pub use config::Settings;
pub use watcher::actions::{BasicAuth, EchoAction, PostAction, RunAction};
pub use watcher::{
    Action, ActionError, Outcome, Paranoia, Reporter, Reporting, WatchConfig, WatchConfigBuilder,
    WatchError, WatchHandle, Watcher,
};
