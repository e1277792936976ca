//! springboard binary: parse flags, merge settings, watch.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use springboard::cli::commands::{init, watch};
use springboard::cli::{Cli, Commands};
use springboard::watcher::Action;
use springboard::{EchoAction, PostAction, RunAction, Settings, logging};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow::anyhow!("{e}"))
    .context("Configuration error")?;

    watch::apply_overrides(&mut settings.watch, &cli.watch);
    logging::init_with_config(&settings.logging, watch::reporting(&settings.watch));

    let (dir, action): (_, Arc<dyn Action>) = match cli.command {
        Commands::Init { force } => return init::run_init(force),
        Commands::Config => return init::run_config(&settings),
        Commands::Post {
            mime,
            uname,
            pass,
            url,
            dir,
        } => {
            let mut action = PostAction::new(url);
            if let Some(mime) = mime {
                action = action.with_mime(mime);
            }
            if let Some(uname) = uname {
                action = action.with_basic_auth(uname, pass);
            }
            (dir, Arc::new(action))
        }
        Commands::Run {
            args,
            post_args,
            cmd,
            dir,
        } => {
            let action = RunAction::new(cmd)
                .with_args(args)
                .with_post_args(post_args);
            (dir, Arc::new(action))
        }
        Commands::Echo { dir } => (dir, Arc::new(EchoAction::new())),
    };

    let config = watch::build_config(&settings.watch, dir, action, cli.watch.exit_after_one)?;
    springboard::debug_event!("main", "config", "{config:?}");

    watch::run_watch(config).await?;
    Ok(())
}
