//! Resolved install root and configuration shared by every command.
//!
//! The install root comes from `MIGRATOR_HOME` or the binary's own
//! directory, never from the process cwd.

use crate::cli::error::HelpfulError;
use migrator_dispatch::{resolve_install_root, DispatchError, MigratorConfig};
use std::path::{Path, PathBuf};

pub struct Context {
    pub install_root: PathBuf,
    pub config: MigratorConfig,
}

impl Context {
    pub fn resolve(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let install_root = resolve_install_root()?;
        let config = MigratorConfig::discover(config_path, &install_root).map_err(|e| match e {
            DispatchError::Config(details) => {
                anyhow::Error::new(HelpfulError::invalid_config(config_path, &details))
            }
            other => anyhow::Error::new(other),
        })?;
        Ok(Self {
            install_root,
            config,
        })
    }
}
