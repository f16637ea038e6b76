//! Migrator Dispatch - Workspace Watcher & Pipeline Launcher
//!
//! Watches a workspace for new project directories and hands each one to an
//! external migration pipeline exactly once.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌───────────────┐
//! │  Workspace  │     │  Debouncer  │     │   Watcher   │     │   Executor    │
//! │  (notify)   │────▶│ (per name)  │────▶│ (filter +   │────▶│ (classify →   │
//! │             │     │             │     │  processed) │     │  allocate →   │
//! └─────────────┘     └─────────────┘     └─────────────┘     │  pipeline)    │
//!                                                             └───────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Candidate project**: a workspace child not yet processed and not excluded
//! - **ProcessedSet**: durable JSON record that prevents re-dispatch
//! - **Versioned output root**: `{project}-v{N}` allocated per attempt
//! - **Stack tag**: opaque classifier output selecting pipeline, fallback or skip

pub mod allocator;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod debounce;
pub mod error;
pub mod executor;
pub mod filter;
pub mod preflight;
pub mod state;
pub mod watcher;

// Re-exports for convenience
pub use allocator::{VersionAllocator, VersionedOutputLayout};
pub use cancel::CancellationToken;
pub use classify::{
    CommandClassifier, HeuristicClassifier, StackClassifier, StackPolicy, StackRoute, StackTag,
};
pub use config::{resolve_install_root, CommandSpec, MigratorConfig};
pub use debounce::Debouncer;
pub use error::{DispatchError, Result};
pub use executor::{DispatchExecutor, DispatchJob, DispatchOutcome, Dispatcher, JobStatus};
pub use filter::{EligibilityFilter, SkipReason};
pub use state::ProcessedSet;
pub use watcher::{BacklogSummary, EntryOutcome, WatcherState, WorkspaceWatcher};
