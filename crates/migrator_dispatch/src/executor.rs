//! Dispatch Executor
//!
//! Turns one project directory into one of three outcomes:
//! - pipeline stacks get a versioned output root and a run of the external pipeline
//! - known-but-unsupported stacks get a placeholder listing
//! - unknown stacks are logged and left alone
//!
//! A pipeline that exits non-zero is a reportable outcome, not an error.
//! Only failing to start it at all is `PipelineSpawnFailed`.

use crate::allocator::{VersionAllocator, VersionedOutputLayout};
use crate::cancel::CancellationToken;
use crate::classify::{classifier_from_config, StackClassifier, StackPolicy, StackRoute, StackTag};
use crate::config::{CommandSpec, MigratorConfig};
use crate::error::{DispatchError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Source project directory.
pub const ENV_SOURCE_DIR: &str = "SOURCE_DIR";
/// `{versioned-root}/modern-app`
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
/// `{versioned-root}/analysis`
pub const ENV_ANALYSIS_DIR: &str = "ANALYSIS_DIR";
/// `{versioned-root}/results`
pub const ENV_RESULTS_DIR: &str = "RESULTS_DIR";

/// Placeholder artifact written for fallback stacks.
pub const STRUCTURE_FILE: &str = "structure.txt";

/// Poll interval for child exit, timeout and cancellation checks
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Finished,
    TimedOut,
    Cancelled,
}

/// One invocation of the external pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchJob {
    pub source: PathBuf,
    pub project: String,
    pub stack: StackTag,
    pub layout: VersionedOutputLayout,
    pub status: JobStatus,
    /// Absent while running, or when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DispatchJob {
    fn finish(&mut self, status: JobStatus, exit: Option<ExitStatus>) {
        self.status = status;
        self.exit_code = exit.and_then(|s| s.code());
        self.finished_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The pipeline was spawned and ran to an end state.
    Pipeline(DispatchJob),
    /// Placeholder listing written for a known but unsupported stack.
    Fallback {
        project: String,
        stack: StackTag,
        layout: VersionedOutputLayout,
        listing: PathBuf,
    },
    /// Unknown stack, nothing created.
    Skipped { project: String, stack: StackTag },
}

impl DispatchOutcome {
    pub fn stack(&self) -> &StackTag {
        match self {
            Self::Pipeline(job) => &job.stack,
            Self::Fallback { stack, .. } | Self::Skipped { stack, .. } => stack,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "pipeline",
            Self::Fallback { .. } => "fallback",
            Self::Skipped { .. } => "skipped",
        }
    }

    /// Code for a calling process: the pipeline's own code, 1 if it has none, else 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Pipeline(job) => job.exit_code.unwrap_or(1),
            Self::Fallback { .. } | Self::Skipped { .. } => 0,
        }
    }
}

/// Seam between the watcher and whatever handles a candidate.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, project: &Path, cancel: &CancellationToken) -> Result<DispatchOutcome>;
}

pub struct DispatchExecutor {
    allocator: VersionAllocator,
    classifier: Box<dyn StackClassifier>,
    policy: StackPolicy,
    pipeline: CommandSpec,
    timeout: Option<Duration>,
    listing_depth: usize,
}

impl DispatchExecutor {
    pub fn new(
        allocator: VersionAllocator,
        classifier: Box<dyn StackClassifier>,
        policy: StackPolicy,
        pipeline: CommandSpec,
    ) -> Self {
        Self {
            allocator,
            classifier,
            policy,
            pipeline,
            timeout: None,
            listing_depth: 2,
        }
    }

    pub fn from_config(config: &MigratorConfig, output_root: impl Into<PathBuf>) -> Self {
        let allocator =
            VersionAllocator::new(output_root).with_max_attempts(config.max_allocation_attempts);
        Self::new(
            allocator,
            classifier_from_config(config),
            StackPolicy::from_config(config),
            config.pipeline.clone(),
        )
        .with_timeout(config.pipeline_timeout_secs.map(Duration::from_secs))
        .with_listing_depth(config.listing_depth)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_listing_depth(mut self, depth: usize) -> Self {
        self.listing_depth = depth.max(1);
        self
    }

    fn run_pipeline(
        &self,
        source: &Path,
        project: &str,
        stack: StackTag,
        cancel: &CancellationToken,
    ) -> Result<DispatchJob> {
        let layout = self.allocator.allocate(project)?;

        let spawned = Command::new(&self.pipeline.program)
            .args(&self.pipeline.args)
            .current_dir(&layout.root)
            .envs(pipeline_env(source, &layout))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                // Nothing ran, so release the version for the next attempt.
                if let Err(cleanup) = fs::remove_dir_all(&layout.root) {
                    warn!(
                        root = %layout.root.display(),
                        error = %cleanup,
                        "Failed to remove output root after spawn failure"
                    );
                }
                return Err(DispatchError::PipelineSpawnFailed {
                    program: self.pipeline.program.clone(),
                    source: e,
                });
            }
        };

        let mut job = DispatchJob {
            source: source.to_path_buf(),
            project: project.to_string(),
            stack,
            layout,
            status: JobStatus::Running,
            exit_code: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        info!(
            project = %job.project,
            stack = %job.stack,
            pid = child.id(),
            root = %job.layout.root.display(),
            "Dispatch started"
        );

        let (status, exit) = self.wait(&mut child, cancel)?;
        job.finish(status, exit);

        let elapsed_ms = job
            .finished_at
            .map(|end| (end - job.started_at).num_milliseconds())
            .unwrap_or(0);
        match job.status {
            JobStatus::Finished => info!(
                project = %job.project,
                exit_code = ?job.exit_code,
                elapsed_ms,
                "Dispatch finished"
            ),
            _ => warn!(
                project = %job.project,
                status = ?job.status,
                elapsed_ms,
                "Pipeline stopped before completion"
            ),
        }
        Ok(job)
    }

    /// Block until the child exits, the timeout passes, or shutdown is requested.
    fn wait(
        &self,
        child: &mut Child,
        cancel: &CancellationToken,
    ) -> Result<(JobStatus, Option<ExitStatus>)> {
        let program = self.pipeline.program.as_str();
        let started = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| DispatchError::filesystem(program, e))?
            {
                return Ok((JobStatus::Finished, Some(status)));
            }

            let stop = if cancel.is_cancelled() {
                Some(JobStatus::Cancelled)
            } else if self.timeout.is_some_and(|t| started.elapsed() >= t) {
                Some(JobStatus::TimedOut)
            } else {
                None
            };

            if let Some(stop) = stop {
                if let Err(e) = child.kill() {
                    warn!(pid = child.id(), error = %e, "Failed to kill pipeline");
                }
                let status = child.wait().map_err(|e| DispatchError::filesystem(program, e))?;
                return Ok((stop, Some(status)));
            }

            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn write_fallback(
        &self,
        source: &Path,
        project: &str,
        stack: StackTag,
    ) -> Result<DispatchOutcome> {
        let layout = self.allocator.allocate_minimal(&format!("{project}-{stack}"))?;
        let listing = layout.analysis_dir().join(STRUCTURE_FILE);
        let content = structure_listing(source, &stack, self.listing_depth);
        fs::write(&listing, content).map_err(|e| DispatchError::filesystem(&listing, e))?;

        info!(
            project,
            stack = %stack,
            listing = %listing.display(),
            "Stack not supported by the pipeline, wrote placeholder listing"
        );
        Ok(DispatchOutcome::Fallback {
            project: project.to_string(),
            stack,
            layout,
            listing,
        })
    }
}

impl Dispatcher for DispatchExecutor {
    fn dispatch(&self, project: &Path, cancel: &CancellationToken) -> Result<DispatchOutcome> {
        if !project.is_dir() {
            return Err(DispatchError::invalid_project(format!(
                "{} does not exist or is not a directory",
                project.display()
            )));
        }
        let source = project.canonicalize().map_err(|e| {
            DispatchError::invalid_project(format!("{}: {e}", project.display()))
        })?;
        let name = project_name(&source)?;

        let stack = self.classifier.classify(&source);
        info!(path = %source.display(), project = %name, stack = %stack, "Stack detected");

        match self.policy.route(&stack) {
            StackRoute::Pipeline => self
                .run_pipeline(&source, &name, stack, cancel)
                .map(DispatchOutcome::Pipeline),
            StackRoute::Fallback => self.write_fallback(&source, &name, stack),
            StackRoute::Skip => {
                info!(
                    path = %source.display(),
                    stack = %stack,
                    reason = "unrecognized stack",
                    "Dispatch skipped"
                );
                Ok(DispatchOutcome::Skipped {
                    project: name,
                    stack,
                })
            }
        }
    }
}

/// Lower-cased base name of the project directory.
pub fn project_name(project: &Path) -> Result<String> {
    project
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            DispatchError::invalid_project(format!("{} has no base name", project.display()))
        })
}

/// Environment bindings handed to the pipeline.
pub fn pipeline_env(source: &Path, layout: &VersionedOutputLayout) -> [(&'static str, PathBuf); 4] {
    [
        (ENV_SOURCE_DIR, source.to_path_buf()),
        (ENV_OUTPUT_DIR, layout.app_dir()),
        (ENV_ANALYSIS_DIR, layout.analysis_dir()),
        (ENV_RESULTS_DIR, layout.results_dir()),
    ]
}

fn structure_listing(source: &Path, stack: &StackTag, depth: usize) -> String {
    let mut out = format!(
        "# Project: {}\n# Stack: {}\n# Generated: {}\n\n",
        source.display(),
        stack,
        Utc::now().to_rfc3339()
    );
    let entries = WalkDir::new(source)
        .min_depth(1)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok());
    for entry in entries {
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let suffix = if entry.file_type().is_dir() { "/" } else { "" };
        out.push_str(&format!("{}{}\n", rel.display(), suffix));
    }
    out
}
