//! Version allocation for per-run output directories.
//!
//! Every migration attempt gets a fresh `{project}-v{N}` root next to the
//! previous ones. N is one past the highest numeric suffix on disk; the root
//! itself is created with a non-recursive `create_dir` so a concurrent
//! allocator that wins the race pushes us to the next number instead of
//! sharing a directory.

use crate::error::{DispatchError, Result};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Application output tree inside a versioned root.
pub const APP_OUTPUT_DIR: &str = "modern-app";
/// Analysis artifacts inside a versioned root.
pub const ANALYSIS_DIR: &str = "analysis";
/// Results inside a versioned root.
pub const RESULTS_DIR: &str = "results";

const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// The output directory for one migration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedOutputLayout {
    pub project: String,
    pub version: u32,
    pub root: PathBuf,
}

impl VersionedOutputLayout {
    fn new(base_dir: &Path, project: &str, version: u32) -> Self {
        Self {
            project: project.to_string(),
            version,
            root: base_dir.join(versioned_name(project, version)),
        }
    }

    /// `{project}-v{version}`, the line external callers parse.
    pub fn dir_name(&self) -> String {
        versioned_name(&self.project, self.version)
    }

    pub fn app_dir(&self) -> PathBuf {
        self.root.join(APP_OUTPUT_DIR)
    }

    pub fn frontend_dir(&self) -> PathBuf {
        self.app_dir().join("apps").join("frontend")
    }

    pub fn backend_dir(&self) -> PathBuf {
        self.app_dir().join("apps").join("backend")
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.root.join(ANALYSIS_DIR)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    fn full_subtree(&self) -> [PathBuf; 4] {
        [
            self.frontend_dir(),
            self.backend_dir(),
            self.analysis_dir(),
            self.results_dir(),
        ]
    }
}

fn versioned_name(project: &str, version: u32) -> String {
    format!("{project}-v{version}")
}

/// Allocates versioned output roots below a base directory.
#[derive(Debug, Clone)]
pub struct VersionAllocator {
    base_dir: PathBuf,
    max_attempts: u32,
}

impl VersionAllocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Highest N among `{project}-v{N}` directories, `None` if there are none.
    ///
    /// Matching is on the literal project name; suffixes that are not plain
    /// digits are ignored here and handled by the collision loop.
    pub fn highest_existing_version(&self, project: &str) -> Result<Option<u32>> {
        let prefix = format!("{project}-v");
        let entries =
            fs::read_dir(&self.base_dir).map_err(|e| DispatchError::filesystem(&self.base_dir, e))?;

        let mut highest: Option<u32> = None;
        for entry in entries {
            let entry = entry.map_err(|e| DispatchError::filesystem(&self.base_dir, e))?;
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name();
            let Some(suffix) = name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(version) = suffix.parse::<u32>() {
                highest = Some(highest.map_or(version, |h| h.max(version)));
            }
        }
        Ok(highest)
    }

    /// Allocate `{project}-v{N}` with the full output subtree.
    pub fn allocate(&self, project: &str) -> Result<VersionedOutputLayout> {
        let layout = self.reserve(project)?;
        self.populate(&layout, &layout.full_subtree())?;
        info!(
            project,
            version = layout.version,
            root = %layout.root.display(),
            "Allocated versioned output root"
        );
        Ok(layout)
    }

    /// Allocate `{project}-v{N}` with only the analysis directory.
    pub fn allocate_minimal(&self, project: &str) -> Result<VersionedOutputLayout> {
        let layout = self.reserve(project)?;
        self.populate(&layout, &[layout.analysis_dir()])?;
        debug!(project, version = layout.version, "Allocated minimal output root");
        Ok(layout)
    }

    fn reserve(&self, project: &str) -> Result<VersionedOutputLayout> {
        validate_project_name(project)?;

        let mut version = self
            .highest_existing_version(project)?
            .map_or(1, |h| h.saturating_add(1));

        for attempt in 1..=self.max_attempts {
            let layout = VersionedOutputLayout::new(&self.base_dir, project, version);
            match fs::create_dir(&layout.root) {
                Ok(()) => return Ok(layout),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(
                        project,
                        version,
                        attempt,
                        "Versioned root already exists, trying next version"
                    );
                    version = version.saturating_add(1);
                }
                Err(e) => return Err(DispatchError::filesystem(&layout.root, e)),
            }
        }

        Err(DispatchError::VersionAllocationExhausted {
            project: project.to_string(),
            attempts: self.max_attempts,
        })
    }

    fn populate(&self, layout: &VersionedOutputLayout, dirs: &[PathBuf]) -> Result<()> {
        for dir in dirs {
            if let Err(e) = fs::create_dir_all(dir) {
                // Do not leave a half-built root that looks like a valid run.
                if let Err(cleanup) = fs::remove_dir_all(&layout.root) {
                    warn!(
                        root = %layout.root.display(),
                        error = %cleanup,
                        "Failed to remove partially created output root"
                    );
                }
                return Err(DispatchError::filesystem(dir, e));
            }
        }
        Ok(())
    }
}

fn validate_project_name(project: &str) -> Result<()> {
    if project.is_empty() {
        return Err(DispatchError::invalid_project("project name is empty"));
    }
    if project.contains(['/', '\\']) || project == "." || project == ".." {
        return Err(DispatchError::invalid_project(format!(
            "project name '{project}' is not a single path component"
        )));
    }
    Ok(())
}
