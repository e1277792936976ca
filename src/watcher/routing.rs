//! Success/failure routing of processed files.

use std::io;
use std::path::{Path, PathBuf};

use super::pipeline::Outcome;
use super::report::Reporter;

/// Where a routed file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Moved into the archive directory.
    Archived(PathBuf),
    /// Moved into the error directory.
    Errored(PathBuf),
    /// Left where it was: no destination configured, the move failed, or
    /// the file was already routed by this worker.
    Stayed,
}

/// Moves one file to its archive or error destination, at most once.
#[derive(Debug)]
pub struct Router<'a> {
    path: &'a Path,
    archive_dir: Option<&'a Path>,
    error_dir: Option<&'a Path>,
    routed: bool,
}

impl<'a> Router<'a> {
    pub fn new(path: &'a Path, archive_dir: Option<&'a Path>, error_dir: Option<&'a Path>) -> Self {
        Self {
            path,
            archive_dir,
            error_dir,
            routed: false,
        }
    }

    /// Route the file according to the pipeline outcome.
    ///
    /// Only the first call can move anything. Move failures are reported
    /// and leave the file in place; they are not retried.
    pub async fn route(&mut self, outcome: &Outcome, reporter: &Reporter) -> Routed {
        if self.routed {
            reporter.debug(
                "route",
                format!("{} already routed", self.path.display()),
            );
            return Routed::Stayed;
        }
        self.routed = true;

        let dir = if outcome.is_success() {
            self.archive_dir
        } else {
            self.error_dir
        };
        let Some(dir) = dir else {
            reporter.debug("route", format!("leaving {}", self.path.display()));
            return Routed::Stayed;
        };

        let Some(file_name) = self.path.file_name() else {
            reporter.error("route", format!("no file name in {}", self.path.display()));
            return Routed::Stayed;
        };
        let dest = dir.join(file_name);

        match move_file(self.path, &dest).await {
            Ok(()) => {
                reporter.debug(
                    "route",
                    format!("{} -> {}", self.path.display(), dest.display()),
                );
                if outcome.is_success() {
                    Routed::Archived(dest)
                } else {
                    Routed::Errored(dest)
                }
            }
            Err(e) => {
                reporter.error(
                    "route",
                    format!(
                        "cannot move {} to {}: {e}",
                        self.path.display(),
                        dest.display()
                    ),
                );
                Routed::Stayed
            }
        }
    }
}

/// Rename `from` to `to`, copying across filesystems when needed.
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to).await,
        Err(e) => Err(e),
    }
}

/// Copy `from` to `to`, then remove `from`. On failure a `to` created
/// here is removed again, so the file stays only at `from`.
async fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let existed = tokio::fs::try_exists(to).await.unwrap_or(true);
    let result = match tokio::fs::copy(from, to).await {
        Ok(_) => tokio::fs::remove_file(from).await,
        Err(e) => Err(e),
    };

    if result.is_err() && !existed {
        if let Err(e) = tokio::fs::remove_file(to).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("[route] cannot clean up {}: {e}", to.display());
            }
        }
    }
    result
}
