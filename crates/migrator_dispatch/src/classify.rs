//! Stack classification
//!
//! A classifier turns a project directory into an opaque stack tag such as
//! `vb6` or `csharp`. Detection never fails: anything that goes wrong yields
//! `unknown` so that dispatch can still report something.

use crate::config::{CommandSpec, MigratorConfig};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};
use walkdir::WalkDir;

const UNKNOWN: &str = "unknown";

/// Directories the heuristic classifier never descends into.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "bin", "obj"];

/// Opaque stack tag produced by a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StackTag(String);

impl StackTag {
    /// Normalize raw classifier output: trimmed, lower-cased, empty ⇒ `unknown`.
    pub fn new(raw: &str) -> Self {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() {
            Self::unknown()
        } else {
            Self(tag)
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pluggable stack detection.
pub trait StackClassifier: Send + Sync {
    fn classify(&self, project: &Path) -> StackTag;
}

/// Runs an external classifier and reads the first stdout line.
pub struct CommandClassifier {
    command: CommandSpec,
}

impl CommandClassifier {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl StackClassifier for CommandClassifier {
    fn classify(&self, project: &Path) -> StackTag {
        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(project)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    program = %self.command.program,
                    error = %e,
                    "Stack classifier could not be started, treating stack as unknown"
                );
                return StackTag::unknown();
            }
        };

        if !output.status.success() {
            warn!(
                program = %self.command.program,
                path = %project.display(),
                status = %output.status,
                "Stack classifier failed, treating stack as unknown"
            );
            return StackTag::unknown();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        StackTag::new(line)
    }
}

/// Built-in extension-count heuristic.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    fn extension_counts(project: &Path) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        let walker = WalkDir::new(project).into_iter().filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !SKIPPED_DIRS.contains(&name.as_ref())
        });

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ext) = entry.path().extension() {
                let ext = ext.to_string_lossy().to_lowercase();
                *counts.entry(ext).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl StackClassifier for HeuristicClassifier {
    fn classify(&self, project: &Path) -> StackTag {
        if !project.is_dir() {
            return StackTag::unknown();
        }
        let counts = Self::extension_counts(project);
        let has = |ext: &str| counts.get(ext).copied().unwrap_or(0) > 0;

        let tag = if has("vbp") || has("frm") {
            "vb6"
        } else if has("cs") && has("csproj") {
            "csharp"
        } else if has("java") {
            "java"
        } else if has("py") {
            "python"
        } else if has("ts") || has("js") {
            "javascript"
        } else {
            UNKNOWN
        };
        debug!(path = %project.display(), stack = tag, "Heuristic stack detection");
        StackTag::new(tag)
    }
}

/// Classifier selected by config: external command if configured, else heuristic.
pub fn classifier_from_config(config: &MigratorConfig) -> Box<dyn StackClassifier> {
    match &config.classifier {
        Some(command) => Box::new(CommandClassifier::new(command.clone())),
        None => Box::new(HeuristicClassifier),
    }
}

/// What the executor does for a given stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackRoute {
    /// Allocate a full output root and run the analysis pipeline.
    Pipeline,
    /// Known but unsupported: write a placeholder listing.
    Fallback,
    /// Unknown: log and do nothing.
    Skip,
}

/// Maps stack tags to routes.
#[derive(Debug, Clone)]
pub struct StackPolicy {
    pipeline: Vec<String>,
    fallback: Vec<String>,
}

impl StackPolicy {
    pub fn new(pipeline: Vec<String>, fallback: Vec<String>) -> Self {
        let normalize = |v: Vec<String>| v.into_iter().map(|s| s.to_lowercase()).collect();
        Self {
            pipeline: normalize(pipeline),
            fallback: normalize(fallback),
        }
    }

    pub fn from_config(config: &MigratorConfig) -> Self {
        Self::new(config.pipeline_stacks.clone(), config.fallback_stacks.clone())
    }

    pub fn route(&self, stack: &StackTag) -> StackRoute {
        if stack.is_unknown() {
            StackRoute::Skip
        } else if self.pipeline.iter().any(|s| s == stack.as_str()) {
            StackRoute::Pipeline
        } else if self.fallback.iter().any(|s| s == stack.as_str()) {
            StackRoute::Fallback
        } else {
            StackRoute::Skip
        }
    }
}

impl Default for StackPolicy {
    fn default() -> Self {
        Self::from_config(&MigratorConfig::default())
    }
}
