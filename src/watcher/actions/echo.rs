//! Action that prints the full path of every file it sees.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;

use crate::watcher::{Action, Reporter};

/// Writes the file path to stdout. Always succeeds.
#[derive(Debug, Default, Clone)]
pub struct EchoAction;

impl EchoAction {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Action for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    async fn process(&self, reporter: &Reporter, path: &Path) -> bool {
        let written = {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", path.display()).and_then(|()| out.flush())
        };
        if let Err(e) = written {
            reporter.debug("echo", format!("stdout write failed: {e}"));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_always_succeeds() {
        let action = EchoAction::new();
        assert_eq!(action.name(), "echo");
        assert!(action.process(&Reporter::default(), Path::new("/no/such/file")).await);
    }
}
