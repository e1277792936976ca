//! Write-stability detection ("paranoia").
//!
//! Defers processing of a file that still looks like it is being written,
//! by polling its modification time until it has been quiet for long
//! enough. Only the worker handling that file waits.

use std::path::Path;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::report::Reporter;

/// Delay between two stability checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How suspicious to be about files that may still be written to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Paranoia {
    /// Process files as soon as they appear.
    #[default]
    None,
    /// Wait until the file has not been modified for 2 seconds.
    Basic,
    /// Wait until the file has not been modified for 30 seconds.
    Extra,
}

impl Paranoia {
    /// Required quiet period, or `None` when no waiting is wanted.
    pub fn threshold(self) -> Option<Duration> {
        match self {
            Paranoia::None => None,
            Paranoia::Basic => Some(Duration::from_secs(2)),
            Paranoia::Extra => Some(Duration::from_secs(30)),
        }
    }

    /// Whether a file last modified at `modified` should still be left alone.
    ///
    /// A modification time in the future counts as settled, so clock skew
    /// cannot stall a worker forever.
    pub fn is_settling(self, modified: SystemTime, now: SystemTime) -> bool {
        let Some(threshold) = self.threshold() else {
            return false;
        };

        match now.duration_since(modified) {
            Ok(quiet) => quiet <= threshold,
            Err(_) => false,
        }
    }
}

/// Poll `path` until `paranoia` considers it stable.
///
/// A path that cannot be stat'ed is treated as stable; later steps will
/// fail on it naturally.
pub async fn wait_until_stable(path: &Path, paranoia: Paranoia, reporter: &Reporter) {
    if paranoia == Paranoia::None {
        return;
    }

    loop {
        let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                reporter.debug(
                    "paranoia",
                    format!("cannot stat {} ({e}), going ahead", path.display()),
                );
                return;
            }
        };

        let now = SystemTime::now();
        if modified > now {
            reporter.debug(
                "paranoia",
                format!("{} modified in the future, going ahead", path.display()),
            );
            return;
        }

        if !paranoia.is_settling(modified, now) {
            return;
        }

        reporter.debug(
            "paranoia",
            format!("{} modified recently, hang on", path.display()),
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn test_no_paranoia_never_settles() {
        let now = SystemTime::now();
        assert!(!Paranoia::None.is_settling(now, now));
    }

    #[test]
    fn test_basic_threshold() {
        let now = SystemTime::now();
        let one_sec_ago = now - Duration::from_secs(1);
        let three_secs_ago = now - Duration::from_secs(3);

        assert!(Paranoia::Basic.is_settling(one_sec_ago, now));
        assert!(Paranoia::Basic.is_settling(now - Duration::from_secs(2), now));
        assert!(!Paranoia::Basic.is_settling(three_secs_ago, now));
    }

    #[test]
    fn test_extra_threshold() {
        let now = SystemTime::now();
        assert!(Paranoia::Extra.is_settling(now - Duration::from_secs(10), now));
        assert!(!Paranoia::Extra.is_settling(now - Duration::from_secs(31), now));
    }

    #[test]
    fn test_future_mtime_is_settled() {
        let now = SystemTime::now();
        let future = now + Duration::from_secs(60);
        assert!(!Paranoia::Basic.is_settling(future, now));
        assert!(!Paranoia::Extra.is_settling(future, now));
    }

    #[test]
    fn test_parse_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            paranoia: Paranoia,
        }

        let w: Wrapper = toml::from_str(r#"paranoia = "extra""#).unwrap();
        assert_eq!(w.paranoia, Paranoia::Extra);
    }

    #[tokio::test]
    async fn test_missing_file_goes_ahead() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");

        let start = Instant::now();
        wait_until_stable(&missing, Paranoia::Extra, &Reporter::default()).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    fn set_mtime(path: &Path, mtime: SystemTime) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn quiet_for(path: &Path) -> Duration {
        let mtime = std::fs::metadata(path).unwrap().modified().unwrap();
        SystemTime::now().duration_since(mtime).unwrap()
    }

    #[tokio::test]
    async fn test_basic_waits_for_quiet_period() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fresh");
        std::fs::write(&path, b"part one").unwrap();

        let start = Instant::now();
        wait_until_stable(&path, Paranoia::Basic, &Reporter::default()).await;

        assert!(quiet_for(&path) > Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_basic_waits_out_the_rest_of_the_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("recent");
        std::fs::write(&path, b"x").unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_millis(1500));

        let start = Instant::now();
        wait_until_stable(&path, Paranoia::Basic, &Reporter::default()).await;

        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(500), "waited {waited:?}");
        assert!(waited < Duration::from_secs(2), "waited {waited:?}");
        assert!(quiet_for(&path) > Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_old_file_goes_ahead() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("old");
        std::fs::write(&path, b"x").unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(10));

        let start = Instant::now();
        wait_until_stable(&path, Paranoia::Basic, &Reporter::default()).await;
        assert!(start.elapsed() < POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_future_mtime_goes_ahead() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("skewed");
        std::fs::write(&path, b"x").unwrap();
        set_mtime(&path, SystemTime::now() + Duration::from_secs(60));

        let start = Instant::now();
        wait_until_stable(&path, Paranoia::Extra, &Reporter::default()).await;
        assert!(start.elapsed() < POLL_INTERVAL);
    }
}
