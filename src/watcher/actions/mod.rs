//! Action implementations for the watch/dispatch engine.

mod echo;
mod post;
mod run;

pub use echo::EchoAction;
pub use post::{BasicAuth, PostAction};
pub use run::RunAction;
