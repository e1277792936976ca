//! Watch/dispatch engine: one subscription, one worker per new file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::action::Action;
use super::error::WatchError;
use super::lock::FileLock;
use super::pipeline;
use super::report::{FileHandledCallback, Reporter, Reporting};
use super::routing::{Routed, Router};
use super::stability::{self, Paranoia};

/// Capacity of the channel bridging notify's thread into the event loop.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Everything a watcher needs to know. Immutable once the watch starts.
pub struct WatchConfig {
    dir: PathBuf,
    actions: Vec<Arc<dyn Action>>,
    archive_dir: Option<PathBuf>,
    error_dir: Option<PathBuf>,
    process_existing: bool,
    paranoia: Paranoia,
    reporting: Reporting,
    on_file_handled: Option<FileHandledCallback>,
    exit_after_one: bool,
}

impl WatchConfig {
    /// Create a builder watching `dir`.
    pub fn builder(dir: impl Into<PathBuf>) -> WatchConfigBuilder {
        WatchConfigBuilder::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub fn archive_dir(&self) -> Option<&Path> {
        self.archive_dir.as_deref()
    }

    pub fn error_dir(&self) -> Option<&Path> {
        self.error_dir.as_deref()
    }

    pub fn process_existing(&self) -> bool {
        self.process_existing
    }

    pub fn paranoia(&self) -> Paranoia {
        self.paranoia
    }

    pub fn reporting(&self) -> Reporting {
        self.reporting
    }

    pub fn exit_after_one(&self) -> bool {
        self.exit_after_one
    }
}

impl fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<&str> = self.actions.iter().map(|a| a.name()).collect();
        f.debug_struct("WatchConfig")
            .field("dir", &self.dir)
            .field("actions", &actions)
            .field("archive_dir", &self.archive_dir)
            .field("error_dir", &self.error_dir)
            .field("process_existing", &self.process_existing)
            .field("paranoia", &self.paranoia)
            .field("reporting", &self.reporting)
            .field("on_file_handled", &self.on_file_handled.is_some())
            .field("exit_after_one", &self.exit_after_one)
            .finish()
    }
}

/// Builder for [`WatchConfig`].
pub struct WatchConfigBuilder {
    dir: PathBuf,
    actions: Vec<Arc<dyn Action>>,
    archive_dir: Option<PathBuf>,
    error_dir: Option<PathBuf>,
    process_existing: bool,
    paranoia: Paranoia,
    reporting: Reporting,
    on_file_handled: Option<FileHandledCallback>,
    exit_after_one: bool,
}

impl WatchConfigBuilder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            actions: Vec::new(),
            archive_dir: None,
            error_dir: None,
            process_existing: false,
            paranoia: Paranoia::None,
            reporting: Reporting::default(),
            on_file_handled: None,
            exit_after_one: false,
        }
    }

    /// Append an action to the pipeline.
    pub fn action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Append an already shared action to the pipeline.
    pub fn shared_action(mut self, action: Arc<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    /// Move successfully processed files here.
    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Move files whose pipeline failed here.
    pub fn error_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.error_dir = Some(dir.into());
        self
    }

    /// Process files already in the directory when the watch starts.
    pub fn process_existing(mut self, yes: bool) -> Self {
        self.process_existing = yes;
        self
    }

    pub fn paranoia(mut self, paranoia: Paranoia) -> Self {
        self.paranoia = paranoia;
        self
    }

    pub fn reporting(mut self, reporting: Reporting) -> Self {
        self.reporting = reporting;
        self
    }

    /// Called once per dispatched file after routing, whatever the outcome.
    pub fn on_file_handled(mut self, callback: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.on_file_handled = Some(Arc::new(callback));
        self
    }

    /// Stop watching once the first file has been fully handled.
    pub fn exit_after_one(mut self, yes: bool) -> Self {
        self.exit_after_one = yes;
        self
    }

    /// Validate and build the config.
    ///
    /// The watched, archive and error directories must all be different.
    pub fn build(self) -> Result<WatchConfig, WatchError> {
        if self.dir.as_os_str().is_empty() {
            return Err(WatchError::InvalidConfig {
                reason: "no directory to watch".to_string(),
            });
        }

        let named = [
            ("watched", Some(&self.dir)),
            ("archive", self.archive_dir.as_ref()),
            ("error", self.error_dir.as_ref()),
        ];
        for (i, (a_name, a)) in named.iter().enumerate() {
            for (b_name, b) in &named[i + 1..] {
                let (Some(a), Some(b)) = (a, b) else {
                    continue;
                };
                if same_dir(a, b) {
                    return Err(WatchError::InvalidConfig {
                        reason: format!(
                            "{a_name} and {b_name} directories are both {}",
                            a.display()
                        ),
                    });
                }
            }
        }

        Ok(WatchConfig {
            dir: self.dir,
            actions: self.actions,
            archive_dir: self.archive_dir,
            error_dir: self.error_dir,
            process_existing: self.process_existing,
            paranoia: self.paranoia,
            reporting: self.reporting,
            on_file_handled: self.on_file_handled,
            exit_after_one: self.exit_after_one,
        })
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Directory watcher dispatching new files through the action pipeline.
///
/// [`Watcher::start`] returns as soon as the subscription is in place and
/// leaves the event loop running in the background; [`Watcher::run`] also
/// waits for the loop to end.
pub struct Watcher {
    dispatcher: Arc<Dispatcher>,
}

impl Watcher {
    pub fn new(config: WatchConfig) -> Self {
        let reporter = Reporter::new(config.reporting);
        Self {
            dispatcher: Arc::new(Dispatcher {
                config,
                reporter,
                shutdown: CancellationToken::new(),
                in_flight: DashMap::new(),
            }),
        }
    }

    /// Token that stops the watch when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.dispatcher.shutdown.clone()
    }

    /// Subscribe to the directory and start dispatching in the background.
    ///
    /// Fails if the subscription cannot be created or the directory cannot
    /// be watched; no worker is spawned in that case.
    pub async fn start(self) -> Result<WatchHandle, WatchError> {
        let dispatcher = self.dispatcher;
        let dir = dispatcher.config.dir.clone();

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        // Subscribe before sweeping so nothing created during startup is lost.
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watcher", "watching", "{}", dir.display());

        if dispatcher.config.process_existing {
            dispatcher.sweep().await?;
        }

        let shutdown = dispatcher.shutdown.clone();
        let task = tokio::spawn(dispatcher.pump(watcher, rx));

        crate::log_event!("watcher", "started", "{}", dir.display());
        Ok(WatchHandle { shutdown, task })
    }

    /// Start watching and wait until the watch ends.
    pub async fn run(self) -> Result<(), WatchError> {
        self.start().await?.wait().await
    }
}

/// Handle on a running watch.
///
/// Dropping the handle leaves the watch running; use [`WatchHandle::close`]
/// to stop it.
#[derive(Debug)]
pub struct WatchHandle {
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), WatchError>>,
}

impl WatchHandle {
    /// Ask the watch to stop. Safe to call more than once.
    ///
    /// Workers already in flight run to completion.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait for the event loop to end, returning its terminal error if any.
    pub async fn wait(self) -> Result<(), WatchError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(WatchError::LoopAborted {
                reason: e.to_string(),
            }),
        }
    }
}

/// State shared by the event loop and every worker of one watch.
struct Dispatcher {
    config: WatchConfig,
    reporter: Reporter,
    shutdown: CancellationToken,
    /// Paths currently claimed by a worker, with their pending flag.
    in_flight: DashMap<PathBuf, bool>,
}

impl Dispatcher {
    /// Receive events until shutdown or a subscription error.
    async fn pump(
        self: Arc<Self>,
        watcher: RecommendedWatcher,
        mut events: mpsc::Receiver<notify::Result<Event>>,
    ) -> Result<(), WatchError> {
        let result = loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break Ok(()),

                res = events.recv() => match res {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => {
                        tracing::error!("[watcher] file watch error: {e}");
                        break Err(WatchError::EventError {
                            details: e.to_string(),
                        });
                    }
                    None => break Err(WatchError::ChannelClosed),
                },
            }
        };

        // Close the channel first so notify's thread cannot block on a send
        // while the subscription is torn down.
        drop(events);
        drop(watcher);
        self.shutdown.cancel();

        crate::log_event!("watcher", "stopped", "{}", self.config.dir.display());
        result
    }

    fn handle_event(self: &Arc<Self>, event: Event) {
        if !is_creation(&event.kind) {
            self.reporter
                .debug("watcher", format!("ignoring {:?} {:?}", event.kind, event.paths));
            return;
        }

        for path in event.paths {
            self.reporter
                .debug("watcher", format!("create event for {}", path.display()));
            self.spawn_worker(path);
        }
    }

    /// Dispatch every entry already present in the watched directory.
    async fn sweep(self: &Arc<Self>) -> Result<(), WatchError> {
        let dir = &self.config.dir;
        self.reporter.debug("watcher", "processing existing files");

        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|e| WatchError::PathWatchFailed {
                    path: dir.clone(),
                    reason: e.to_string(),
                })?;

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    self.reporter
                        .debug("watcher", format!("existing file {}", path.display()));
                    self.spawn_worker(path);
                }
                Ok(None) => break,
                Err(e) => {
                    self.reporter
                        .error("watcher", format!("cannot list {}: {e}", dir.display()));
                    break;
                }
            }
        }
        Ok(())
    }

    fn spawn_worker(self: &Arc<Self>, path: PathBuf) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.handle_file(path).await;
        });
    }

    /// Handle `path`, again if another creation event for it arrived
    /// while it was being handled.
    async fn handle_file(&self, path: PathBuf) {
        let Some(mut claim) = Claim::take(&self.in_flight, &path) else {
            self.reporter.debug(
                "watcher",
                format!("{} busy, handling again afterwards", path.display()),
            );
            return;
        };

        loop {
            self.process_file(&path, &claim).await;
            if !claim.release_or_rerun() {
                break;
            }
            self.reporter
                .debug("watcher", format!("{} created again, rehandling", path.display()));
        }
    }

    /// Full lifecycle of one file: lock, settle, process, route, report.
    async fn process_file(&self, path: &Path, claim: &Claim<'_>) {
        if !self.wants_file(path).await {
            return;
        }

        let reporter = &self.reporter;
        let lock = match FileLock::acquire(path) {
            Ok(lock) => Some(lock),
            Err(e) => {
                reporter.error("lock", format!("cannot lock {}: {e}", path.display()));
                None
            }
        };

        stability::wait_until_stable(path, self.config.paranoia, reporter).await;

        let outcome = pipeline::run(&self.config.actions, reporter, path).await;

        // A file renamed over this one has not been through the actions yet;
        // it is left for the next round. Without a lock there is no file
        // identity to compare, so any new creation event counts.
        let replaced = match &lock {
            Some(lock) => !lock.still_at_path(),
            None => claim.is_pending(),
        };
        let routed = if replaced {
            reporter.debug(
                "route",
                format!("{} replaced while processing, not moving it", path.display()),
            );
            Routed::Stayed
        } else {
            let mut router = Router::new(
                path,
                self.config.archive_dir.as_deref(),
                self.config.error_dir.as_deref(),
            );
            router.route(&outcome, reporter).await
        };
        drop(lock);

        reporter.debug(
            "watcher",
            format!("handled {} ({outcome:?}, {routed:?})", path.display()),
        );

        if let Some(callback) = &self.config.on_file_handled {
            callback(path);
        }

        if self.config.exit_after_one {
            reporter.debug("watcher", "exit after one requested");
            self.shutdown.cancel();
        }
    }

    /// Only existing regular files are dispatched.
    async fn wants_file(&self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => true,
            Ok(meta) if meta.is_dir() => {
                self.reporter
                    .debug("watcher", format!("rejecting dir {}", path.display()));
                false
            }
            Ok(_) => {
                self.reporter
                    .debug("watcher", format!("rejecting irregular file {}", path.display()));
                false
            }
            Err(e) => {
                self.reporter
                    .debug("watcher", format!("cannot stat {}: {e}", path.display()));
                false
            }
        }
    }
}

/// A new entry appeared in the directory: created, or renamed into it.
fn is_creation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Claim on a path in the in-flight map, released on drop.
///
/// The map value is the pending flag: set when another creation event for
/// the path arrives while the claim is held.
struct Claim<'a> {
    map: &'a DashMap<PathBuf, bool>,
    path: PathBuf,
    released: bool,
}

impl<'a> Claim<'a> {
    /// Claim `path`, or mark the current holder pending and return `None`.
    fn take(map: &'a DashMap<PathBuf, bool>, path: &Path) -> Option<Self> {
        match map.entry(path.to_path_buf()) {
            Entry::Occupied(mut held) => {
                *held.get_mut() = true;
                None
            }
            Entry::Vacant(free) => {
                free.insert(false);
                Some(Self {
                    map,
                    path: path.to_path_buf(),
                    released: false,
                })
            }
        }
    }

    fn is_pending(&self) -> bool {
        self.map.get(&self.path).is_some_and(|pending| *pending)
    }

    /// Release the claim, unless an event arrived meanwhile: then clear the
    /// flag, keep the claim and return true.
    fn release_or_rerun(&mut self) -> bool {
        if self.map.remove_if(&self.path, |_, pending| !*pending).is_some() {
            self.released = true;
            return false;
        }
        if let Some(mut pending) = self.map.get_mut(&self.path) {
            *pending = false;
        }
        true
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.map.remove(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use tempfile::TempDir;

    #[test]
    fn test_creation_events() {
        assert!(is_creation(&EventKind::Create(CreateKind::File)));
        assert!(is_creation(&EventKind::Create(CreateKind::Any)));
        assert!(is_creation(&EventKind::Modify(ModifyKind::Name(
            RenameMode::To
        ))));

        assert!(!is_creation(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(!is_creation(&EventKind::Modify(ModifyKind::Name(
            RenameMode::From
        ))));
        assert!(!is_creation(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let map = DashMap::new();
        let path = Path::new("/in/foo");

        let first = Claim::take(&map, path).unwrap();
        assert!(Claim::take(&map, path).is_none());
        assert!(Claim::take(&map, Path::new("/in/bar")).is_some());

        drop(first);
        assert!(Claim::take(&map, path).is_some());
    }

    #[test]
    fn test_collided_claim_is_rerun_not_dropped() {
        let map = DashMap::new();
        let path = Path::new("/in/foo");

        let mut claim = Claim::take(&map, path).unwrap();
        assert!(!claim.is_pending());

        assert!(Claim::take(&map, path).is_none());
        assert!(claim.is_pending());

        // First release hands the path back for another round
        assert!(claim.release_or_rerun());
        assert!(!claim.is_pending());
        assert!(map.contains_key(path));

        assert!(!claim.release_or_rerun());
        assert!(!map.contains_key(path));

        // Dropping a released claim leaves a newer claim alone
        let newer = Claim::take(&map, path).unwrap();
        drop(claim);
        assert!(map.contains_key(path));
        drop(newer);
        assert!(!map.contains_key(path));
    }

    #[test]
    fn test_build_rejects_shared_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let err = WatchConfig::builder(dir).archive_dir(dir).build().unwrap_err();
        assert!(matches!(err, WatchError::InvalidConfig { .. }));

        let other = dir.join("out");
        let err = WatchConfig::builder(dir)
            .archive_dir(&other)
            .error_dir(&other)
            .build()
            .unwrap_err();
        assert!(matches!(err, WatchError::InvalidConfig { .. }));
    }

    #[test]
    fn test_build_accepts_nested_archive() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let config = WatchConfig::builder(dir)
            .archive_dir(dir.join("arch"))
            .error_dir(dir.join("err"))
            .process_existing(true)
            .paranoia(Paranoia::Basic)
            .build()
            .unwrap();

        assert_eq!(config.dir(), dir);
        assert_eq!(config.archive_dir(), Some(dir.join("arch").as_path()));
        assert!(config.process_existing());
        assert_eq!(config.paranoia(), Paranoia::Basic);
        assert!(config.actions().is_empty());
    }

    #[test]
    fn test_build_rejects_empty_dir() {
        assert!(WatchConfig::builder("").build().is_err());
    }
}
