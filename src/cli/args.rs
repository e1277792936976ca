//! CLI argument parsing using clap.
//!
//! Contains the Cli struct, the global watch options and the Commands enum.

use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::watcher::Paranoia;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Watch a directory for files and send them places
#[derive(Parser, Debug)]
#[command(
    name = "springboard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch a directory for files and send them places",
    long_about = "Watch a directory for new files and run each one through an action: \
                  post it over HTTP, run a command on it, or print its path.",
    after_help = "Examples:\n  springboard --archive /srv/done echo /srv/inbox\n  springboard --process-existing --error-dir /srv/failed post http://host/in /srv/inbox\n  springboard --paranoia basic run --arg -v --post-arg /srv/out cp /srv/inbox",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub watch: WatchArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every watching subcommand. They override settings.toml.
#[derive(Args, Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchArgs {
    /// Move the file to this location after successful action
    #[arg(long, global = true, value_name = "DIR")]
    pub archive: Option<PathBuf>,

    /// Move the file to this location when an action fails
    #[arg(long, global = true, value_name = "DIR")]
    pub error_dir: Option<PathBuf>,

    /// Process any pre-existing files in the directory on startup
    #[arg(long, global = true)]
    pub process_existing: bool,

    /// Wait for files to stop changing before processing them
    #[arg(long, global = true, value_enum)]
    pub paranoia: Option<Paranoia>,

    /// Enable verbose messaging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Report what actions are doing
    #[arg(long, global = true)]
    pub report_actions: bool,

    /// Do not report per-file failures
    #[arg(long, global = true)]
    pub quiet_errors: bool,

    /// Stop after the first file has been handled
    #[arg(long, global = true, hide = true)]
    pub exit_after_one: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Post each new file somewhere
    #[command(about = "Post the file somewhere")]
    Post {
        /// Force the mime type on the post
        #[arg(long)]
        mime: Option<String>,

        /// Triggers use of HTTP basic auth with the provided username
        #[arg(long)]
        uname: Option<String>,

        /// Set the password for HTTP basic auth
        #[arg(long)]
        pass: Option<String>,

        /// Where to post to
        url: String,

        /// Directory to watch
        dir: PathBuf,
    },

    /// Run a command on each new file
    #[command(
        about = "Run a command on the file",
        after_help = "The command is run as: CMD [--arg ...] FILE [--post-arg ...]"
    )]
    Run {
        /// Argument placed before the file path (repeatable)
        #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Argument placed after the file path (repeatable)
        #[arg(long = "post-arg", value_name = "ARG", allow_hyphen_values = true)]
        post_args: Vec<String>,

        /// Command to run
        cmd: String,

        /// Directory to watch
        dir: PathBuf,
    },

    /// Print the full path of each new file
    #[command(about = "Echo the full filepath")]
    Echo {
        /// Directory to watch
        dir: PathBuf,
    },

    /// Initialize project
    #[command(about = "Set up .springboard directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}
