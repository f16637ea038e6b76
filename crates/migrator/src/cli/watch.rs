//! `migrator watch` - backlog scan, then live monitoring until a signal arrives.

use crate::cli::context::Context;
use crate::cli::error::HelpfulError;
use crate::cli::install_shutdown_handler;
use migrator_dispatch::{CancellationToken, DispatchExecutor, WorkspaceWatcher};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

pub struct WatchArgs {
    pub workspace: Option<PathBuf>,
    pub once: bool,
}

pub fn run(args: WatchArgs, ctx: Context) -> anyhow::Result<ExitCode> {
    let mut config = ctx.config;
    if let Some(workspace) = args.workspace {
        if !workspace.exists() {
            return Err(HelpfulError::path_not_found(&workspace).into());
        }
        if !workspace.is_dir() {
            return Err(HelpfulError::not_a_directory(&workspace).into());
        }
        config.workspace = Some(workspace);
    }

    let workspace = config.workspace_root(&ctx.install_root)?;
    let executor = DispatchExecutor::from_config(&config, config.output_root_for(&workspace));

    let cancel = CancellationToken::new();
    install_shutdown_handler(cancel.clone())?;

    let mut watcher = WorkspaceWatcher::from_config(&config, &ctx.install_root, Arc::new(executor))?
        .with_cancel(cancel);

    info!(
        "Watching {} (state: {})",
        watcher.root().display(),
        watcher.processed().path().display()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        if args.once {
            let summary = watcher.scan_backlog().await?;
            info!(
                "Backlog done: {} dispatched, {} already processed, {} skipped, {} failed",
                summary.dispatched, summary.already_processed, summary.skipped, summary.failed
            );
        } else {
            watcher.run().await?;
        }
        Ok::<_, anyhow::Error>(())
    })?;

    info!("Watcher stopped");
    Ok(ExitCode::SUCCESS)
}
