//! Pre-flight checks run before a watcher is started.

use crate::config::{CommandSpec, MigratorConfig};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Run every check. Order is stable for display.
pub fn run_checks(config: &MigratorConfig, install_root: &Path) -> Vec<CheckResult> {
    let config = config.clone().resolve_commands(install_root);
    let mut results = check_command("pipeline", &config.pipeline);
    if let Some(classifier) = &config.classifier {
        results.extend(check_command("classifier", classifier));
    }

    match config.workspace_root(install_root) {
        Ok(root) => results.push(check_workspace(&root)),
        Err(e) => results.push(CheckResult::fail("workspace", e.to_string())),
    }
    results.push(check_state_dir(&config.state_file_path(install_root)));
    results
}

pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.ok)
}

/// The program, plus the script it is handed when there is one.
fn check_command(name: &str, command: &CommandSpec) -> Vec<CheckResult> {
    let mut results = vec![check_program(name, &command.program)];
    if let Some(script) = command.script() {
        let check = format!("{name} script");
        results.push(if script.is_file() {
            CheckResult::pass(check, format!("{} exists", script.display()))
        } else {
            CheckResult::fail(check, format!("{} not found", script.display()))
        });
    }
    results
}

fn check_program(name: &str, program: &str) -> CheckResult {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 {
        return if as_path.is_file() {
            CheckResult::pass(name, format!("{program} exists"))
        } else {
            CheckResult::fail(name, format!("{program} not found"))
        };
    }
    match which::which(program) {
        Ok(path) => CheckResult::pass(name, format!("{program} found at {}", path.display())),
        Err(_) => CheckResult::fail(name, format!("{program} not found in PATH")),
    }
}

fn check_workspace(root: &Path) -> CheckResult {
    if root.is_dir() {
        CheckResult::pass("workspace", format!("{} is a directory", root.display()))
    } else {
        CheckResult::fail("workspace", format!("{} is missing or not a directory", root.display()))
    }
}

fn check_state_dir(state_file: &Path) -> CheckResult {
    let dir = state_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let marker = dir.join(".migrator-preflight");
    let writable = fs::create_dir_all(&dir)
        .and_then(|_| fs::write(&marker, b"ok"))
        .and_then(|_| fs::remove_file(&marker));
    match writable {
        Ok(()) => CheckResult::pass("state", format!("{} is writable", dir.display())),
        Err(e) => CheckResult::fail("state", format!("{} is not writable: {e}", dir.display())),
    }
}
