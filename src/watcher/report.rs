//! Reporting gates and the "file handled" hook.
//!
//! Three independent switches decide what a running watcher says about
//! itself: `debug` for verbose tracing of every decision, `report_actions`
//! for what each action did, and `report_errors` for per-file failures.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Callback invoked once per dispatched file, after routing has settled.
pub type FileHandledCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Logging gates for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporting {
    /// Verbose messaging about every step.
    #[serde(default)]
    pub debug: bool,

    /// Report what actions are doing.
    #[serde(default)]
    pub report_actions: bool,

    /// Report per-file failures.
    #[serde(default = "default_true")]
    pub report_errors: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Reporting {
    fn default() -> Self {
        Self {
            debug: false,
            report_actions: false,
            report_errors: true,
        }
    }
}

/// Gated logging sink handed to workers and actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    gates: Reporting,
}

impl Reporter {
    pub fn new(gates: Reporting) -> Self {
        Self { gates }
    }

    pub fn gates(&self) -> Reporting {
        self.gates
    }

    /// Emit a debug message when the debug gate is open.
    pub fn debug(&self, scope: &str, message: impl fmt::Display) {
        if self.gates.debug {
            crate::debug_event!(scope, message);
        }
    }

    /// Emit an action report when the action gate is open.
    pub fn action(&self, scope: &str, message: impl fmt::Display) {
        if self.gates.report_actions {
            crate::log_event!(scope, message);
        }
    }

    /// Emit an error report when the error gate is open.
    pub fn error(&self, scope: &str, message: impl fmt::Display) {
        if self.gates.report_errors {
            tracing::error!("[{scope}] {message}");
        }
    }
}
