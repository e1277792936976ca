//! Action that runs an external command on each file.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::watcher::{Action, ActionError, Reporter};

/// Runs `cmd [args...] <file> [post_args...]` and waits for it.
///
/// A non-zero exit status, or failing to start the command at all, counts
/// as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAction {
    cmd: String,
    args: Vec<String>,
    post_args: Vec<String>,
}

impl RunAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args: Vec::new(),
            post_args: Vec::new(),
        }
    }

    /// Arguments placed before the file path.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments appended after the file path.
    pub fn with_post_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.post_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.cmd);
        command.args(&self.args).arg(path).args(&self.post_args);
        command
    }

    async fn run(&self, path: &Path) -> Result<(), ActionError> {
        let status = self
            .command(path)
            .status()
            .await
            .map_err(|source| ActionError::Spawn {
                cmd: self.cmd.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ActionError::Exit {
                cmd: self.cmd.clone(),
                status,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Action for RunAction {
    fn name(&self) -> &str {
        "run"
    }

    async fn process(&self, reporter: &Reporter, path: &Path) -> bool {
        reporter.action(
            "run",
            format!("running {} on {}", self.cmd, path.display()),
        );

        match self.run(path).await {
            Ok(()) => {
                reporter.action("run", "command successful");
                true
            }
            Err(e) => {
                reporter.error("run", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_order() {
        let action = RunAction::new("cp")
            .with_args(["-v"])
            .with_post_args(["/tmp/out"]);

        let command = action.command(Path::new("/in/foo"));
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(command.as_std().get_program(), "cp");
        assert_eq!(args, vec!["-v", "/in/foo", "/tmp/out"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides_result() {
        let reporter = Reporter::default();
        let path = Path::new("/dev/null");

        assert!(RunAction::new("true").process(&reporter, path).await);
        assert!(!RunAction::new("false").process(&reporter, path).await);
    }

    #[tokio::test]
    async fn test_missing_command_fails() {
        let action = RunAction::new("springboard-no-such-command");
        assert!(!action.process(&Reporter::default(), Path::new("x")).await);
    }
}
