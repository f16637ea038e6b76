//! Workspace Watcher
//!
//! Owns the processed set and drives candidates through the dispatcher
//! exactly once. Lifecycle:
//!
//! ```text
//! Initializing → ScanningBacklog → Watching ⇄ Dispatching → Stopped
//! ```
//!
//! Dispatch is serial: the loop awaits each dispatch before taking the next
//! settled name, so two jobs for one path can never overlap, and the loop is
//! the only writer of the processed set.

use crate::cancel::CancellationToken;
use crate::config::MigratorConfig;
use crate::debounce::Debouncer;
use crate::error::{DispatchError, Result};
use crate::executor::Dispatcher;
use crate::filter::{EligibilityFilter, SkipReason};
use crate::state::ProcessedSet;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Initializing,
    ScanningBacklog,
    Watching,
    Dispatching,
    Stopped,
}

/// What happened to one workspace entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Dispatched { label: &'static str, exit_code: i32 },
    AlreadyProcessed,
    Ineligible(SkipReason),
    /// Gone, or not a directory, by the time we looked.
    NotADirectory,
    /// Marked processed, but dispatch raised an error.
    Failed { kind: &'static str },
}

/// Counts from one backlog scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacklogSummary {
    pub dispatched: usize,
    pub already_processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BacklogSummary {
    fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Dispatched { .. } => self.dispatched += 1,
            EntryOutcome::AlreadyProcessed => self.already_processed += 1,
            EntryOutcome::Ineligible(_) | EntryOutcome::NotADirectory => self.skipped += 1,
            EntryOutcome::Failed { .. } => {
                self.dispatched += 1;
                self.failed += 1;
            }
        }
    }
}

pub struct WorkspaceWatcher {
    root: PathBuf,
    processed: ProcessedSet,
    filter: EligibilityFilter,
    dispatcher: Arc<dyn Dispatcher>,
    debounce: Duration,
    cancel: CancellationToken,
    state: WatcherState,
}

impl WorkspaceWatcher {
    /// Resolve the workspace root and load the processed set.
    ///
    /// A root that cannot be resolved is fatal. A corrupt state file is not.
    pub fn new(
        root: impl AsRef<Path>,
        state_file: impl Into<PathBuf>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| DispatchError::filesystem(root, e))?;
        if !root.is_dir() {
            return Err(DispatchError::Config(format!(
                "Workspace root {} is not a directory",
                root.display()
            )));
        }

        let processed = ProcessedSet::load_or_reset(state_file);
        info!(
            root = %root.display(),
            state_file = %processed.path().display(),
            processed = processed.len(),
            "Watcher initialized"
        );

        Ok(Self {
            root,
            processed,
            filter: EligibilityFilter::default(),
            dispatcher,
            debounce: Duration::from_secs(1),
            cancel: CancellationToken::new(),
            state: WatcherState::Initializing,
        })
    }

    pub fn from_config(
        config: &MigratorConfig,
        install_root: &Path,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        let root = config.workspace_root(install_root)?;
        Ok(Self::new(root, config.state_file_path(install_root), dispatcher)?
            .with_filter(EligibilityFilter::from_config(config))
            .with_debounce(Duration::from_millis(config.debounce_ms)))
    }

    pub fn with_filter(mut self, filter: EligibilityFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    fn set_state(&mut self, state: WatcherState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Watcher state");
            self.state = state;
        }
    }

    /// Scan once, then watch until cancelled.
    pub async fn run(&mut self) -> Result<()> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let root = self.root.clone();
        let mut fs_watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for name in child_names(&root, &event) {
                        let _ = event_tx.send(name);
                    }
                }
                Err(e) => warn!(error = %e, "Filesystem watch error"),
            })?;
        // Subscribe before the backlog scan so nothing created during it is missed.
        fs_watcher.watch(&self.root, RecursiveMode::NonRecursive)?;

        let summary = self.scan_backlog().await?;
        info!(
            dispatched = summary.dispatched,
            already_processed = summary.already_processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Backlog scan complete"
        );

        self.serve(event_rx).await;
        drop(fs_watcher);
        Ok(())
    }

    /// Consider every immediate entry of the root once, in name order.
    pub async fn scan_backlog(&mut self) -> Result<BacklogSummary> {
        self.set_state(WatcherState::ScanningBacklog);

        let mut entries: Vec<PathBuf> = fs::read_dir(&self.root)
            .map_err(|e| DispatchError::filesystem(&self.root, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        let mut summary = BacklogSummary::default();
        for path in entries {
            if self.cancel.is_cancelled() {
                break;
            }
            let outcome = self.process_entry(path).await;
            summary.record(&outcome);
        }
        Ok(summary)
    }

    /// Debounce `events` (immediate-child names) and dispatch settled ones until cancelled.
    pub async fn serve(&mut self, events: mpsc::UnboundedReceiver<String>) {
        let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::new(self.debounce).spawn(events, ready_tx);
        let cancel = self.cancel.clone();
        self.set_state(WatcherState::Watching);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                name = ready_rx.recv() => match name {
                    Some(name) => {
                        let path = self.root.join(&name);
                        self.process_entry(path).await;
                    }
                    None => break,
                },
            }
        }

        debouncer.abort();
        self.set_state(WatcherState::Stopped);
        info!(root = %self.root.display(), "Watcher stopped");
    }

    /// Filter, gate on the processed set, persist, then dispatch.
    pub async fn process_entry(&mut self, path: PathBuf) -> EntryOutcome {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return EntryOutcome::NotADirectory,
        };

        if let Err(reason) = self.filter.check(&name) {
            debug!(name = %name, reason = %reason, "Skipped");
            return EntryOutcome::Ineligible(reason);
        }
        if !path.is_dir() {
            debug!(path = %path.display(), reason = "not a directory", "Skipped");
            return EntryOutcome::NotADirectory;
        }
        if self.processed.contains(&path) {
            debug!(path = %path.display(), reason = "already processed", "Skipped");
            return EntryOutcome::AlreadyProcessed;
        }

        info!(path = %path.display(), "Candidate detected");

        // Append then persist before spawning: a crash after spawn must not
        // lose the marker.
        self.processed.insert(&path);
        if let Err(e) = self.processed.persist() {
            // Not durable, so leave it eligible for a later event or restart.
            self.processed.remove(&path);
            error!(
                path = %path.display(),
                error = %e,
                "Failed to persist processed set, dispatch aborted"
            );
            return EntryOutcome::Failed { kind: e.kind() };
        }

        let previous = self.state;
        self.set_state(WatcherState::Dispatching);
        let dispatcher = Arc::clone(&self.dispatcher);
        let cancel = self.cancel.clone();
        let job_path = path.clone();
        let result =
            tokio::task::spawn_blocking(move || dispatcher.dispatch(&job_path, &cancel)).await;
        self.set_state(previous);

        match result {
            Ok(Ok(outcome)) => {
                let exit_code = outcome.exit_code();
                info!(
                    path = %path.display(),
                    outcome = outcome.label(),
                    stack = %outcome.stack(),
                    exit_code,
                    "Dispatch complete"
                );
                EntryOutcome::Dispatched {
                    label: outcome.label(),
                    exit_code,
                }
            }
            Ok(Err(e)) => {
                if matches!(e, DispatchError::VersionAllocationExhausted { .. }) {
                    error!(
                        path = %path.display(),
                        error = %e,
                        "Version allocation exhausted; check the output root for stray entries"
                    );
                } else {
                    error!(path = %path.display(), kind = e.kind(), error = %e, "Dispatch failed");
                }
                EntryOutcome::Failed { kind: e.kind() }
            }
            Err(join) => {
                error!(path = %path.display(), error = %join, "Dispatch task panicked");
                EntryOutcome::Failed { kind: "panic" }
            }
        }
    }
}

/// Names of immediate children of `root` created or renamed by `event`.
pub fn child_names(root: &Path, event: &Event) -> Vec<String> {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    );
    if !relevant {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| p.parent() == Some(root))
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RenameMode};

    #[test]
    fn test_child_names_for_create_and_rename() {
        let root = Path::new("/work");
        let create = Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/work/NewProj"));
        assert_eq!(child_names(root, &create), vec!["NewProj"]);

        let rename = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/work/Renamed"));
        assert_eq!(child_names(root, &rename), vec!["Renamed"]);
    }

    #[test]
    fn test_child_names_ignores_nested_and_data_events() {
        let root = Path::new("/work");
        let nested = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/work/NewProj/src/main.bas"));
        assert!(child_names(root, &nested).is_empty());

        let write = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/work/NewProj"));
        assert!(child_names(root, &write).is_empty());
    }

    #[test]
    fn test_summary_counts_failures_as_dispatched() {
        let mut summary = BacklogSummary::default();
        summary.record(&EntryOutcome::Failed { kind: "filesystem" });
        summary.record(&EntryOutcome::AlreadyProcessed);
        summary.record(&EntryOutcome::Ineligible(SkipReason::Hidden));
        assert_eq!(
            summary,
            BacklogSummary {
                dispatched: 1,
                already_processed: 1,
                skipped: 1,
                failed: 1,
            }
        );
    }
}
