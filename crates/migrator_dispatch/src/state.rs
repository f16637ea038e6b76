//! Durable record of project paths already handed off for migration.
//!
//! Data-oriented design:
//! - Vec instead of a set (a workspace holds tens of projects, linear search is fine)
//! - Order of insertion is kept so the JSON stays readable
//! - Every write replaces the whole file through a temp file + rename

use crate::error::{DispatchError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The processed set plus the file it persists to.
#[derive(Debug)]
pub struct ProcessedSet {
    path: PathBuf,
    entries: Vec<String>,
}

impl ProcessedSet {
    /// Empty set bound to `path`. Nothing is written until `persist`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Strict load. Missing file ⇒ empty set; unreadable or invalid JSON ⇒ `StateCorrupt`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::empty(path)),
            Err(e) => {
                return Err(DispatchError::StateCorrupt {
                    message: e.to_string(),
                    path,
                })
            }
        };

        let raw: Vec<String> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                return Err(DispatchError::StateCorrupt {
                    message: e.to_string(),
                    path,
                })
            }
        };

        let mut set = Self::empty(path);
        for entry in raw {
            if !set.contains_str(&entry) {
                set.entries.push(entry);
            }
        }
        debug!(path = %set.path.display(), entries = set.entries.len(), "Loaded processed set");
        Ok(set)
    }

    /// Load, falling back to an empty set when the file is corrupt.
    pub fn load_or_reset(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "Processed set unusable, starting from empty");
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, project: &Path) -> bool {
        self.contains_str(&project.to_string_lossy())
    }

    fn contains_str(&self, project: &str) -> bool {
        self.entries.iter().any(|e| e == project)
    }

    /// Append a path. Returns false if it was already present.
    pub fn insert(&mut self, project: &Path) -> bool {
        let key = project.to_string_lossy();
        if self.contains_str(&key) {
            return false;
        }
        self.entries.push(key.into_owned());
        true
    }

    /// Drop a path that was never made durable. Returns false if absent.
    pub fn remove(&mut self, project: &Path) -> bool {
        let key = project.to_string_lossy();
        let before = self.entries.len();
        self.entries.retain(|e| *e != key);
        self.entries.len() != before
    }

    /// Write the whole set as a JSON array, replacing the file atomically.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DispatchError::filesystem(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| DispatchError::Config(format!("Failed to encode processed set: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| DispatchError::filesystem(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(DispatchError::filesystem(&self.path, e));
        }
        Ok(())
    }
}
