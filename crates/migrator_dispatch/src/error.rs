//! Error types for the dispatch layer.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Dispatch operation result type.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors raised while allocating, dispatching or persisting state.
///
/// Everything here is local to one candidate project except `Watch` and `Config`;
/// the watcher catches these at its dispatch boundary and keeps running.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Input path missing or not a directory
    #[error("Invalid project: {0}")]
    InvalidProject(String),

    /// IO failure creating directories or writing state
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Collision loop ran past its retry cap
    #[error("Version allocation exhausted for '{project}' after {attempts} attempts")]
    VersionAllocationExhausted { project: String, attempts: u32 },

    /// The pipeline process could not be started at all
    #[error("Failed to spawn pipeline '{program}': {source}")]
    PipelineSpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Persisted processed-set file unreadable or not a JSON array of strings
    #[error("State file corrupt at {}: {message}", path.display())]
    StateCorrupt { path: PathBuf, message: String },

    /// Filesystem notifications could not be set up
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    /// Create a filesystem error bound to a path.
    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create an invalid project error.
    pub fn invalid_project(msg: impl Into<String>) -> Self {
        Self::InvalidProject(msg.into())
    }

    /// Short machine-friendly name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidProject(_) => "invalid_project",
            Self::Filesystem { .. } => "filesystem",
            Self::VersionAllocationExhausted { .. } => "version_allocation_exhausted",
            Self::PipelineSpawnFailed { .. } => "pipeline_spawn_failed",
            Self::StateCorrupt { .. } => "state_corrupt",
            Self::Watch(_) => "watch",
            Self::Config(_) => "config",
        }
    }
}
