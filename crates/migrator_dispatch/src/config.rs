//! Configuration for the dispatcher

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted processed set inside the install root.
pub const STATE_FILE_NAME: &str = "processed_projects.json";
/// File name of the optional config inside the install root.
pub const CONFIG_FILE_NAME: &str = "migrator.toml";
/// Environment override for the install root.
pub const HOME_ENV: &str = "MIGRATOR_HOME";

/// An external program invocation: executable plus leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Anchor a relative program path and relative script arguments at `base`.
    ///
    /// Bare program names are left for PATH lookup. Flags, inline shell
    /// snippets and absolute paths pass through unchanged.
    pub fn resolve(&self, base: &Path) -> Self {
        let program = if Path::new(&self.program).components().count() > 1 {
            base.join(&self.program).to_string_lossy().into_owned()
        } else {
            self.program.clone()
        };
        let args = self
            .args
            .iter()
            .map(|arg| {
                if is_path_arg(arg) {
                    base.join(arg).to_string_lossy().into_owned()
                } else {
                    arg.clone()
                }
            })
            .collect();
        Self { program, args }
    }

    /// First argument naming a script file, if any.
    pub fn script(&self) -> Option<&Path> {
        self.args
            .iter()
            .find(|arg| is_path_arg(arg))
            .map(|arg| Path::new(arg.as_str()))
    }
}

/// `scripts/run.sh` or `/opt/run.sh`, not `-c`, `exit 0` or `$DIR/x`.
fn is_path_arg(arg: &str) -> bool {
    !arg.starts_with('-')
        && !arg.contains(char::is_whitespace)
        && !arg.contains('$')
        && Path::new(arg).components().count() > 1
}

/// Main configuration for the migrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Workspace root to watch (default: parent of the install root)
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Processed-set JSON file (default: `{install_root}/processed_projects.json`)
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Where versioned output roots are created (default: the workspace root)
    #[serde(default)]
    pub output_root: Option<PathBuf>,

    /// Quiet period before a burst of events for one name is acted on
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Cap on the version collision loop
    #[serde(default = "default_max_allocation_attempts")]
    pub max_allocation_attempts: u32,

    /// Depth of the placeholder listing written for fallback stacks
    #[serde(default = "default_listing_depth")]
    pub listing_depth: usize,

    /// Kill the pipeline after this many seconds. Absent means wait forever.
    #[serde(default)]
    pub pipeline_timeout_secs: Option<u64>,

    /// External stack classifier. Absent uses the built-in heuristic.
    #[serde(default)]
    pub classifier: Option<CommandSpec>,

    /// Analysis pipeline launched for pipeline stacks. Relative paths are
    /// anchored at the install root.
    #[serde(default = "default_pipeline")]
    pub pipeline: CommandSpec,

    /// Stacks that get the full pipeline
    #[serde(default = "default_pipeline_stacks")]
    pub pipeline_stacks: Vec<String>,

    /// Known stacks that only get a placeholder listing
    #[serde(default = "default_fallback_stacks")]
    pub fallback_stacks: Vec<String>,

    /// Entry names never treated as projects (case-insensitive)
    #[serde(default = "default_excluded_names")]
    pub excluded_names: Vec<String>,

    /// Output-directory prefixes never treated as projects (case-insensitive)
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_max_allocation_attempts() -> u32 {
    1000
}

fn default_listing_depth() -> usize {
    2
}

fn default_pipeline() -> CommandSpec {
    CommandSpec::new("bash", &["scripts/run_pipeline.sh"])
}

fn default_pipeline_stacks() -> Vec<String> {
    vec!["vb6".to_string()]
}

fn default_fallback_stacks() -> Vec<String> {
    ["csharp", "java", "javascript", "python"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_excluded_names() -> Vec<String> {
    vec!["node_modules".to_string()]
}

fn default_excluded_prefixes() -> Vec<String> {
    vec!["biblioteca-v".to_string()]
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            state_file: None,
            output_root: None,
            debounce_ms: default_debounce_ms(),
            max_allocation_attempts: default_max_allocation_attempts(),
            listing_depth: default_listing_depth(),
            pipeline_timeout_secs: None,
            classifier: None,
            pipeline: default_pipeline(),
            pipeline_stacks: default_pipeline_stacks(),
            fallback_stacks: default_fallback_stacks(),
            excluded_names: default_excluded_names(),
            excluded_prefixes: default_excluded_prefixes(),
        }
    }
}

impl MigratorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| DispatchError::filesystem(path, e))?;
        toml::from_str(&content)
            .map_err(|e| DispatchError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| DispatchError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| DispatchError::filesystem(path, e))
    }

    /// Load an explicit config, else `{install_root}/migrator.toml` if present, else defaults.
    /// Command paths come back anchored at the install root.
    pub fn discover(explicit: Option<&Path>, install_root: &Path) -> Result<Self> {
        let candidate = install_root.join(CONFIG_FILE_NAME);
        let config = match explicit {
            Some(path) => Self::load(path)?,
            None if candidate.is_file() => Self::load(&candidate)?,
            None => Self::default(),
        };
        Ok(config.resolve_commands(install_root))
    }

    /// Anchor the pipeline and classifier commands at `install_root`.
    pub fn resolve_commands(mut self, install_root: &Path) -> Self {
        self.pipeline = self.pipeline.resolve(install_root);
        self.classifier = self.classifier.map(|c| c.resolve(install_root));
        self
    }

    /// Workspace root: configured, else the install root's parent.
    pub fn workspace_root(&self, install_root: &Path) -> Result<PathBuf> {
        if let Some(workspace) = &self.workspace {
            return Ok(workspace.clone());
        }
        install_root.parent().map(Path::to_path_buf).ok_or_else(|| {
            DispatchError::Config(format!(
                "Install root {} has no parent; set `workspace` explicitly",
                install_root.display()
            ))
        })
    }

    pub fn state_file_path(&self, install_root: &Path) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| install_root.join(STATE_FILE_NAME))
    }

    pub fn output_root_for(&self, workspace: &Path) -> PathBuf {
        self.output_root
            .clone()
            .unwrap_or_else(|| workspace.to_path_buf())
    }
}

/// Directory the dispatcher is installed in.
///
/// `MIGRATOR_HOME` wins; otherwise the directory holding the running binary.
/// The process cwd is never consulted.
pub fn resolve_install_root() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    let exe = std::env::current_exe().map_err(|e| DispatchError::filesystem("<current_exe>", e))?;
    let exe = exe.canonicalize().unwrap_or(exe);
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| DispatchError::Config(format!("Binary {} has no parent", exe.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MigratorConfig::default();
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.max_allocation_attempts, 1000);
        assert_eq!(config.pipeline_stacks, vec!["vb6"]);
        assert!(config.fallback_stacks.contains(&"csharp".to_string()));
        assert!(config.pipeline_timeout_secs.is_none());
        assert!(config.classifier.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        let config = MigratorConfig {
            workspace: Some(PathBuf::from("/work")),
            debounce_ms: 250,
            pipeline_timeout_secs: Some(3600),
            classifier: Some(CommandSpec::new("python3", &["scripts/detect_stack.py"])),
            ..MigratorConfig::default()
        };
        config.save(&path).unwrap();

        let parsed = MigratorConfig::load(&path).unwrap();
        assert_eq!(parsed.workspace, config.workspace);
        assert_eq!(parsed.debounce_ms, 250);
        assert_eq!(parsed.pipeline_timeout_secs, Some(3600));
        assert_eq!(parsed.classifier, config.classifier);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: MigratorConfig = toml::from_str("debounce_ms = 10\n").unwrap();
        assert_eq!(parsed.debounce_ms, 10);
        assert_eq!(parsed.excluded_names, vec!["node_modules"]);
        assert_eq!(parsed.pipeline.program, "bash");
    }

    #[test]
    fn test_path_resolution() {
        let install = Path::new("/work/.agent");
        let config = MigratorConfig::default();
        assert_eq!(config.workspace_root(install).unwrap(), PathBuf::from("/work"));
        assert_eq!(
            config.state_file_path(install),
            PathBuf::from("/work/.agent/processed_projects.json")
        );
        assert_eq!(config.output_root_for(Path::new("/work")), PathBuf::from("/work"));
    }

    #[test]
    fn test_discover_without_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = MigratorConfig::discover(None, temp.path()).unwrap();
        assert_eq!(config.debounce_ms, 1000);
    }

    #[test]
    fn test_default_pipeline_is_anchored_at_install_root() {
        let temp = TempDir::new().unwrap();
        let config = MigratorConfig::discover(None, temp.path()).unwrap();
        assert_eq!(config.pipeline.program, "bash");
        assert_eq!(
            config.pipeline.script(),
            Some(temp.path().join("scripts/run_pipeline.sh").as_path())
        );
    }

    #[test]
    fn test_resolve_keeps_bare_names_and_inline_scripts() {
        let base = Path::new("/opt/migrator");
        let spec = CommandSpec::new("sh", &["-c", "echo \"$SOURCE_DIR\" > out/log"]).resolve(base);
        assert_eq!(spec, CommandSpec::new("sh", &["-c", "echo \"$SOURCE_DIR\" > out/log"]));
        assert_eq!(spec.script(), None);

        let spec = CommandSpec::new("tools/classify", &["./detect.py", "/abs/x.py"]).resolve(base);
        assert_eq!(spec.program, "/opt/migrator/tools/classify");
        assert_eq!(spec.args, vec!["/opt/migrator/./detect.py", "/abs/x.py"]);
    }

    #[test]
    fn test_discover_resolves_file_commands() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[classifier]\nprogram = \"python3\"\nargs = [\"scripts/detect_stack.py\"]\n",
        )
        .unwrap();
        let config = MigratorConfig::discover(None, temp.path()).unwrap();
        let classifier = config.classifier.unwrap();
        assert_eq!(classifier.program, "python3");
        assert_eq!(
            classifier.args,
            vec![temp.path().join("scripts/detect_stack.py").to_string_lossy().into_owned()]
        );
    }

    #[test]
    fn test_invalid_config_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "debounce_ms = \"soon\"").unwrap();
        assert!(matches!(
            MigratorConfig::load(&path),
            Err(DispatchError::Config(_))
        ));
    }
}
