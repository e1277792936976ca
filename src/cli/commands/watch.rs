//! Watching commands: post, run and echo.
//!
//! Each subcommand picks one action; everything else comes from the merged
//! settings (defaults, settings.toml, environment, then CLI flags).

use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::WatchArgs;
use crate::config::WatchSettings;
use crate::watcher::{Action, Reporting, WatchConfig, WatchError, Watcher};

/// Layer CLI flags over the loaded watch settings.
///
/// Flags only ever switch behaviour on; an absent flag keeps whatever the
/// settings file or environment said.
pub fn apply_overrides(settings: &mut WatchSettings, args: &WatchArgs) {
    if let Some(dir) = &args.archive {
        settings.archive_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.error_dir {
        settings.error_dir = Some(dir.clone());
    }
    if let Some(paranoia) = args.paranoia {
        settings.paranoia = paranoia;
    }
    settings.process_existing |= args.process_existing;
    settings.debug |= args.debug;
    settings.report_actions |= args.report_actions;
    if args.quiet_errors {
        settings.report_errors = false;
    }
}

/// Reporting gates for the merged settings.
pub fn reporting(settings: &WatchSettings) -> Reporting {
    Reporting {
        debug: settings.debug,
        report_actions: settings.report_actions,
        report_errors: settings.report_errors,
    }
}

/// Assemble a validated watch configuration for `dir` with one action.
pub fn build_config(
    settings: &WatchSettings,
    dir: PathBuf,
    action: Arc<dyn Action>,
    exit_after_one: bool,
) -> Result<WatchConfig, WatchError> {
    let mut builder = WatchConfig::builder(dir)
        .shared_action(action)
        .process_existing(settings.process_existing)
        .paranoia(settings.paranoia)
        .reporting(reporting(settings))
        .exit_after_one(exit_after_one);

    if let Some(archive) = &settings.archive_dir {
        builder = builder.archive_dir(archive);
    }
    if let Some(error_dir) = &settings.error_dir {
        builder = builder.error_dir(error_dir);
    }

    builder.build()
}

/// Start watching and block until shutdown.
///
/// Ctrl-C closes the watch; in-flight workers are not awaited.
pub async fn run_watch(config: WatchConfig) -> Result<(), WatchError> {
    for dir in [config.archive_dir(), config.error_dir()].into_iter().flatten() {
        if !dir.is_dir() {
            tracing::warn!(
                "[watch] {} does not exist, files routed there will stay put",
                dir.display()
            );
        }
    }

    let handle = Watcher::new(config).start().await?;

    let shutdown = handle.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            crate::debug_event!("watch", "interrupted");
            shutdown.cancel();
        }
    });

    handle.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::Paranoia;
    use crate::watcher::actions::EchoAction;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_settings() {
        let mut settings = WatchSettings {
            archive_dir: Some(PathBuf::from("/from/file")),
            ..WatchSettings::default()
        };
        let args = WatchArgs {
            archive: Some(PathBuf::from("/from/cli")),
            paranoia: Some(Paranoia::Basic),
            process_existing: true,
            quiet_errors: true,
            ..WatchArgs::default()
        };

        apply_overrides(&mut settings, &args);

        assert_eq!(settings.archive_dir, Some(PathBuf::from("/from/cli")));
        assert_eq!(settings.paranoia, Paranoia::Basic);
        assert!(settings.process_existing);
        assert!(!settings.report_errors);
    }

    #[test]
    fn test_absent_flags_keep_settings() {
        let mut settings = WatchSettings {
            error_dir: Some(PathBuf::from("/from/file")),
            paranoia: Paranoia::Extra,
            report_actions: true,
            ..WatchSettings::default()
        };
        let before = settings.clone();

        apply_overrides(&mut settings, &WatchArgs::default());

        assert_eq!(settings, before);
    }

    #[test]
    fn test_build_config_carries_settings() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("archive");
        let settings = WatchSettings {
            archive_dir: Some(archive.clone()),
            process_existing: true,
            paranoia: Paranoia::Basic,
            ..WatchSettings::default()
        };

        let config = build_config(
            &settings,
            temp.path().to_path_buf(),
            Arc::new(EchoAction::new()),
            true,
        )
        .unwrap();

        assert_eq!(config.dir(), temp.path());
        assert_eq!(config.archive_dir(), Some(archive.as_path()));
        assert_eq!(config.error_dir(), None);
        assert_eq!(config.actions().len(), 1);
        assert!(config.process_existing());
        assert!(config.exit_after_one());
        assert_eq!(config.paranoia(), Paranoia::Basic);
    }

    #[test]
    fn test_build_config_rejects_archive_equal_to_dir() {
        let temp = TempDir::new().unwrap();
        let settings = WatchSettings {
            archive_dir: Some(temp.path().to_path_buf()),
            ..WatchSettings::default()
        };

        let result = build_config(
            &settings,
            temp.path().to_path_buf(),
            Arc::new(EchoAction::new()),
            false,
        );
        assert!(matches!(result, Err(WatchError::InvalidConfig { .. })));
    }
}
