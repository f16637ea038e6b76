use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn migrator_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_migrator"))
}

/// Install root at `{temp}/.agent`, so the default workspace is `{temp}`.
struct CliEnv {
    _temp: TempDir,
    root: PathBuf,
    install: PathBuf,
}

impl CliEnv {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let install = root.join(".agent");
        fs::create_dir_all(&install).unwrap();
        Self {
            _temp: temp,
            root,
            install,
        }
    }

    fn write_config(&self, body: &str) {
        fs::write(self.install.join("migrator.toml"), body).unwrap();
    }

    fn run(&self, args: &[&str], cwd: &Path) -> Output {
        Command::new(migrator_bin())
            .args(args)
            .current_dir(cwd)
            .env("MIGRATOR_HOME", &self.install)
            .env_remove("MIGRATOR_CONFIG")
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to execute migrator CLI")
    }
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn describe(output: &Output) -> String {
    format!(
        "status: {:?}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

// =============================================================================
// allocate
// =============================================================================

#[test]
fn test_allocate_prints_next_version_as_last_line() {
    let env = CliEnv::new();
    let base = env.root.join("out");
    fs::create_dir_all(&base).unwrap();
    let base_arg = base.to_string_lossy().to_string();

    let first = env.run(&["allocate", "--base-dir", &base_arg], &env.root);
    assert!(first.status.success(), "{}", describe(&first));
    assert_eq!(stdout_of(&first).lines().last(), Some("biblioteca-v1"));

    let second = env.run(&["allocate", "--base-dir", &base_arg], &env.root);
    assert!(second.status.success(), "{}", describe(&second));
    assert_eq!(stdout_of(&second).lines().last(), Some("biblioteca-v2"));

    assert!(base.join("biblioteca-v2/modern-app").is_dir());
}

#[test]
fn test_allocate_defaults_to_current_directory() {
    let env = CliEnv::new();
    let output = env.run(&["allocate", "inventory"], &env.root);
    assert!(output.status.success(), "{}", describe(&output));
    assert_eq!(stdout_of(&output).lines().last(), Some("inventory-v1"));
    assert!(env.root.join("inventory-v1").is_dir());
}

#[test]
fn test_allocate_rejects_invalid_name() {
    let env = CliEnv::new();
    let output = env.run(&["allocate", "../escape"], &env.root);
    assert!(!output.status.success(), "{}", describe(&output));
    assert!(!env.root.parent().unwrap().join("escape-v1").exists());
}

// =============================================================================
// detect-stack
// =============================================================================

#[test]
fn test_detect_stack_uses_heuristics_without_classifier() {
    let env = CliEnv::new();
    let project = env.root.join("Legacy");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("App.vbp"), "Type=Exe\n").unwrap();

    let output = env.run(&["detect-stack", project.to_str().unwrap()], &env.root);
    assert!(output.status.success(), "{}", describe(&output));
    assert_eq!(stdout_of(&output).trim(), "vb6");
}

#[test]
fn test_detect_stack_missing_path_fails_with_help() {
    let env = CliEnv::new();
    let missing = env.root.join("Nope");
    let output = env.run(&["detect-stack", missing.to_str().unwrap()], &env.root);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: Not a directory"));
}

// =============================================================================
// preflight
// =============================================================================

#[test]
fn test_preflight_passes_with_available_pipeline() {
    let env = CliEnv::new();
    env.write_config("[pipeline]\nprogram = \"sh\"\nargs = []\n");

    let output = env.run(&["preflight"], &env.root);
    assert!(output.status.success(), "{}", describe(&output));
    assert!(stdout_of(&output).contains("All checks passed."));
}

#[test]
fn test_preflight_fails_with_missing_pipeline() {
    let env = CliEnv::new();
    env.write_config("[pipeline]\nprogram = \"definitely-not-a-real-pipeline\"\nargs = []\n");

    let output = env.run(&["preflight"], &env.root);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    assert!(stdout_of(&output).contains("[FAIL] pipeline"));
}

#[test]
fn test_invalid_config_reports_helpful_error() {
    let env = CliEnv::new();
    env.write_config("debounce_ms = \"soon\"\n");

    let output = env.run(&["preflight"], &env.root);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid configuration"));
}

// =============================================================================
// watch --once / dispatch
// =============================================================================

#[cfg(unix)]
fn write_recording_pipeline(env: &CliEnv) -> PathBuf {
    let out = env.install.join("out");
    fs::create_dir_all(&out).unwrap();
    env.write_config(&format!(
        r#"output_root = '{}'
debounce_ms = 50

[pipeline]
program = "sh"
args = ["-c", 'echo "$SOURCE_DIR" >> ../dispatched.log']
"#,
        out.display()
    ));
    out
}

#[cfg(unix)]
#[test]
fn test_watch_once_dispatches_backlog_exactly_once() {
    let env = CliEnv::new();
    let out = write_recording_pipeline(&env);

    let project = env.root.join("Legacy");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("App.vbp"), "Type=Exe\n").unwrap();
    fs::write(env.root.join("notes.txt"), "not a project").unwrap();

    let first = env.run(&["watch", "--once"], &env.root);
    assert!(first.status.success(), "{}", describe(&first));

    let log = fs::read_to_string(out.join("dispatched.log")).unwrap();
    assert_eq!(log.lines().collect::<Vec<_>>(), vec![project.to_str().unwrap()]);
    assert!(out.join("legacy-v1").is_dir());

    let state = fs::read_to_string(env.install.join("processed_projects.json")).unwrap();
    assert!(state.contains(project.to_str().unwrap()));

    let second = env.run(&["watch", "--once"], &env.root);
    assert!(second.status.success(), "{}", describe(&second));
    let log = fs::read_to_string(out.join("dispatched.log")).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[cfg(unix)]
#[test]
fn test_dispatch_reports_fallback_as_json() {
    let env = CliEnv::new();
    let out = write_recording_pipeline(&env);

    let project = env.root.join("Shop");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("main.py"), "print('hi')\n").unwrap();

    let output = env.run(&["dispatch", "--json", project.to_str().unwrap()], &env.root);
    assert!(output.status.success(), "{}", describe(&output));

    let outcome: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(outcome["kind"], "fallback");
    assert_eq!(outcome["stack"], "python");
    assert!(out.join("shop-python-v1/analysis/structure.txt").is_file());
    assert!(!out.join("dispatched.log").exists());
}

#[cfg(unix)]
#[test]
fn test_default_pipeline_script_runs_from_install_root() {
    let env = CliEnv::new();
    let out = env.root.join("generated");
    fs::create_dir_all(&out).unwrap();
    env.write_config(&format!(
        "output_root = '{}'\nexcluded_names = [\"node_modules\", \"generated\"]\n",
        out.display()
    ));
    let scripts = env.install.join("scripts");
    fs::create_dir_all(&scripts).unwrap();
    fs::write(
        scripts.join("run_pipeline.sh"),
        "#!/bin/bash\npwd -P > \"$RESULTS_DIR/cwd.txt\"\n",
    )
    .unwrap();

    let project = env.root.join("Legacy");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("Main.frm"), "VERSION 5.00\n").unwrap();

    let preflight = env.run(&["preflight"], &env.root);
    assert!(stdout_of(&preflight).contains("[OK  ] pipeline script"), "{}", describe(&preflight));

    let output = env.run(&["watch", "--once"], &project);
    assert!(output.status.success(), "{}", describe(&output));

    let cwd = fs::read_to_string(out.join("legacy-v1/results/cwd.txt")).unwrap();
    assert_eq!(PathBuf::from(cwd.trim()), out.join("legacy-v1"));
}
