//! `migrator detect-stack` - print the stack tag for one project.

use crate::cli::context::Context;
use crate::cli::error::HelpfulError;
use migrator_dispatch::classify::classifier_from_config;
use migrator_dispatch::StackClassifier;
use std::path::PathBuf;
use std::process::ExitCode;

pub struct DetectStackArgs {
    pub path: PathBuf,
}

pub fn run(args: DetectStackArgs, ctx: Context) -> anyhow::Result<ExitCode> {
    if !args.path.is_dir() {
        return Err(HelpfulError::not_a_directory(&args.path).into());
    }
    let tag = classifier_from_config(&ctx.config).classify(&args.path);
    println!("{}", tag);
    Ok(ExitCode::SUCCESS)
}
