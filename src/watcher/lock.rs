//! Advisory per-file locking.
//!
//! Workers take an exclusive, non-blocking `flock`-style lock on the file
//! they are about to process, so a second worker or a second process
//! cooperating on the same directory backs off. The lock is best effort:
//! failing to get it is reported, but processing still goes ahead.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Held advisory lock on a file. Released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Try to lock `path` exclusively without blocking.
    ///
    /// The file must already exist; it is never created here.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        FileExt::try_lock_exclusive(&file)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path the lock was taken on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `path` still names the file this lock is held on.
    ///
    /// False once the file was removed or something else was renamed over it.
    #[cfg(unix)]
    pub fn still_at_path(&self) -> bool {
        use std::os::unix::fs::MetadataExt;

        match (self.file.metadata(), std::fs::metadata(&self.path)) {
            (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
            _ => false,
        }
    }

    /// Whether `path` still names the file this lock is held on.
    #[cfg(not(unix))]
    pub fn still_at_path(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("[lock] failed to release {}: {e}", self.path.display());
        }
    }
}
