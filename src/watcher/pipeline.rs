//! Sequential action pipeline for one file.

use std::path::Path;
use std::sync::Arc;

use super::action::Action;
use super::report::Reporter;

/// Result of running the action chain on a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every action succeeded (or there were none).
    Success,
    /// The named action failed; later actions were not run.
    Failure { action: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Run `actions` in order on `path`, stopping at the first failure.
///
/// Later actions may rely on side effects of earlier ones, so this is
/// strictly sequential.
pub async fn run(actions: &[Arc<dyn Action>], reporter: &Reporter, path: &Path) -> Outcome {
    for action in actions {
        reporter.debug(
            "pipeline",
            format!("{} -> {}", action.name(), path.display()),
        );

        if !action.process(reporter, path).await {
            reporter.error(
                action.name(),
                format!("failed on {}", path.display()),
            );
            return Outcome::Failure {
                action: action.name().to_string(),
            };
        }
    }

    Outcome::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records every call into a shared journal.
    struct Scripted {
        name: &'static str,
        succeed: bool,
        journal: Arc<Mutex<Vec<(&'static str, PathBuf)>>>,
    }

    #[async_trait]
    impl Action for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn process(&self, _reporter: &Reporter, path: &Path) -> bool {
            self.journal
                .lock()
                .unwrap()
                .push((self.name, path.to_path_buf()));
            self.succeed
        }
    }

    fn scripted(
        name: &'static str,
        succeed: bool,
        journal: &Arc<Mutex<Vec<(&'static str, PathBuf)>>>,
    ) -> Arc<dyn Action> {
        Arc::new(Scripted {
            name,
            succeed,
            journal: journal.clone(),
        })
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds() {
        let outcome = run(&[], &Reporter::default(), Path::new("/tmp/foo")).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_runs_in_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let actions = vec![
            scripted("first", true, &journal),
            scripted("second", true, &journal),
        ];

        let outcome = run(&actions, &Reporter::default(), Path::new("/in/foo")).await;
        assert_eq!(outcome, Outcome::Success);

        let calls = journal.lock().unwrap();
        let names: Vec<_> = calls.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(calls.iter().all(|(_, p)| p == Path::new("/in/foo")));
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let actions = vec![
            scripted("first", true, &journal),
            scripted("broken", false, &journal),
            scripted("never", true, &journal),
        ];

        let outcome = run(&actions, &Reporter::default(), Path::new("/in/bar")).await;
        assert_eq!(
            outcome,
            Outcome::Failure {
                action: "broken".to_string()
            }
        );

        let names: Vec<_> = journal.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["first", "broken"]);
    }
}
