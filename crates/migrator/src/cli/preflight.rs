//! `migrator preflight` - check the environment before starting a watcher.

use crate::cli::context::Context;
use migrator_dispatch::preflight::{all_passed, run_checks};
use std::process::ExitCode;

pub fn run(ctx: Context) -> anyhow::Result<ExitCode> {
    let results = run_checks(&ctx.config, &ctx.install_root);
    for result in &results {
        let status = if result.ok { "OK  " } else { "FAIL" };
        println!("[{}] {:<12} {}", status, result.name, result.detail);
    }

    if all_passed(&results) {
        println!("\nAll checks passed.");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("\nSome checks failed. Fix the items above before running `migrator watch`.");
        Ok(ExitCode::FAILURE)
    }
}
