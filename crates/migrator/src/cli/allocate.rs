//! `migrator allocate` - reserve the next `{name}-v{N}` output root.
//!
//! The last stdout line is the allocated directory name; progress goes to
//! stderr.

use crate::cli::context::Context;
use crate::cli::error::HelpfulError;
use migrator_dispatch::VersionAllocator;
use std::path::PathBuf;
use std::process::ExitCode;

pub struct AllocateArgs {
    pub name: String,
    pub base_dir: Option<PathBuf>,
}

pub fn run(args: AllocateArgs, ctx: Context) -> anyhow::Result<ExitCode> {
    let base_dir = match args.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    if !base_dir.is_dir() {
        return Err(HelpfulError::not_a_directory(&base_dir).into());
    }

    let allocator =
        VersionAllocator::new(&base_dir).with_max_attempts(ctx.config.max_allocation_attempts);
    eprintln!("Allocating output root for '{}' in {}", args.name, base_dir.display());

    let layout = allocator.allocate(&args.name)?;
    eprintln!("Created {}", layout.root.display());
    println!("{}", layout.dir_name());
    Ok(ExitCode::SUCCESS)
}
