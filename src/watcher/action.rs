//! Action trait for the watch/dispatch engine.

use std::path::Path;

use async_trait::async_trait;

use super::report::Reporter;

/// A pluggable unit of work applied to one file.
///
/// Actions report success or failure; they never move, rename or delete
/// the file themselves. Routing is owned by the engine. The same action
/// instance is shared by every worker, so implementations must be safe to
/// call concurrently on different files.
#[async_trait]
pub trait Action: Send + Sync {
    /// Action name for logging.
    fn name(&self) -> &str;

    /// Process one file.
    ///
    /// Returns `true` when the file was handled and may be archived,
    /// `false` when it should go to the error directory (or stay put).
    async fn process(&self, reporter: &Reporter, path: &Path) -> bool;
}
