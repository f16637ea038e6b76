//! `migrator dispatch` - run one project through the executor, bypassing the
//! processed set.

use crate::cli::context::Context;
use crate::cli::error::HelpfulError;
use crate::cli::{exit_code, install_shutdown_handler};
use migrator_dispatch::{CancellationToken, DispatchExecutor, Dispatcher};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

pub struct DispatchArgs {
    pub path: PathBuf,
    pub json: bool,
}

pub fn run(args: DispatchArgs, ctx: Context) -> anyhow::Result<ExitCode> {
    if !args.path.exists() {
        return Err(HelpfulError::path_not_found(&args.path).into());
    }
    if !args.path.is_dir() {
        return Err(HelpfulError::not_a_directory(&args.path).into());
    }

    // Outputs land next to the project unless an output root is configured.
    let project = args.path.canonicalize()?;
    let parent = project.parent().unwrap_or(&project).to_path_buf();
    let executor = DispatchExecutor::from_config(&ctx.config, ctx.config.output_root_for(&parent));

    let cancel = CancellationToken::new();
    install_shutdown_handler(cancel.clone())?;

    let outcome = executor.dispatch(&project, &cancel)?;
    info!(
        "{} finished as {} (stack: {}, exit code {})",
        project.display(),
        outcome.label(),
        outcome.stack(),
        outcome.exit_code()
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(exit_code(outcome.exit_code()))
}
