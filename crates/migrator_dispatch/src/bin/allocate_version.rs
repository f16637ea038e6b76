//! Allocate the next `{project}-v{N}` output root in the current directory.
//!
//! Usage:
//!     migrator-allocate [project] [--base-dir DIR] [--max-attempts N]
//!
//! Progress goes to stderr. The last stdout line is exactly the directory
//! name so calling scripts can capture it with `$(migrator-allocate ...)`.

use migrator_dispatch::VersionAllocator;
use migrator_logging::{init_logging, LogConfig};
use std::path::PathBuf;

const DEFAULT_PROJECT: &str = "biblioteca";

struct Args {
    project: String,
    base_dir: PathBuf,
    max_attempts: u32,
}

fn main() -> anyhow::Result<()> {
    init_logging(LogConfig {
        app_name: "migrator-allocate",
        verbose: false,
        log_dir: None,
    })?;

    let args = parse_args()?;
    let allocator = VersionAllocator::new(&args.base_dir).with_max_attempts(args.max_attempts);
    let layout = allocator.allocate(&args.project)?;

    eprintln!("Created output structure in {}", layout.root.display());
    println!("{}", layout.dir_name());
    Ok(())
}

fn parse_args() -> anyhow::Result<Args> {
    let mut project: Option<String> = None;
    let mut base_dir: Option<PathBuf> = None;
    let mut max_attempts = 1000;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--base-dir" => {
                base_dir = Some(PathBuf::from(next_arg(&mut args, "--base-dir")?));
            }
            "--max-attempts" => {
                max_attempts = next_arg(&mut args, "--max-attempts")?.parse()?;
            }
            other if other.starts_with("--") => {
                return Err(anyhow::anyhow!("Unknown arg: {}", other));
            }
            other => {
                if project.is_some() {
                    return Err(anyhow::anyhow!("Unexpected extra argument: {}", other));
                }
                project = Some(other.to_string());
            }
        }
    }

    let base_dir = match base_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    Ok(Args {
        project: project.unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
        base_dir,
        max_attempts,
    })
}

fn next_arg(args: &mut impl Iterator<Item = String>, name: &str) -> anyhow::Result<String> {
    args.next()
        .ok_or_else(|| anyhow::anyhow!("Missing value for {}", name))
}
