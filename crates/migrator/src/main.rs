//! Migrator CLI
//!
//! Watches a workspace for new legacy projects and hands each one to the
//! migration pipeline. The one-shot commands expose the individual steps.

mod cli;

use clap::{Parser, Subcommand};
use cli::context::Context;
use migrator_logging::{init_logging, logs_dir, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "migrator")]
#[command(about = "Dispatch legacy projects dropped into a workspace to the migration pipeline")]
#[command(version)]
struct Cli {
    /// Config file (defaults to migrator.toml in the install root)
    #[arg(long, global = true, env = "MIGRATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process the backlog, then watch for new projects until interrupted
    Watch {
        /// Workspace to watch (overrides config and the install-root parent)
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Process the backlog and exit without watching
        #[arg(long)]
        once: bool,
    },

    /// Reserve the next versioned output root and print its name
    Allocate {
        /// Project name
        #[arg(default_value = "biblioteca")]
        name: String,

        /// Directory to allocate in (defaults to the current directory)
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },

    /// Classify and dispatch a single project, ignoring the processed set
    Dispatch {
        /// Project directory
        path: PathBuf,

        /// Print the outcome as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print the stack tag the classifier assigns to a project
    DetectStack {
        /// Project directory
        path: PathBuf,
    },

    /// Check the pipeline, classifier, workspace and state file location
    Preflight,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let ctx = Context::resolve(cli.config.as_deref())?;

    // Long-running commands also log to a rolling file under the install root.
    let log_dir = match &cli.command {
        Commands::Watch { .. } | Commands::Dispatch { .. } => Some(logs_dir(&ctx.install_root)),
        _ => None,
    };
    init_logging(LogConfig {
        app_name: "migrator",
        verbose: cli.verbose,
        log_dir: log_dir.as_deref(),
    })?;

    match cli.command {
        Commands::Watch { workspace, once } => {
            cli::watch::run(cli::watch::WatchArgs { workspace, once }, ctx)
        }
        Commands::Allocate { name, base_dir } => {
            cli::allocate::run(cli::allocate::AllocateArgs { name, base_dir }, ctx)
        }
        Commands::Dispatch { path, json } => {
            cli::dispatch::run(cli::dispatch::DispatchArgs { path, json }, ctx)
        }
        Commands::DetectStack { path } => {
            cli::detect_stack::run(cli::detect_stack::DetectStackArgs { path }, ctx)
        }
        Commands::Preflight => cli::preflight::run(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_allocate_defaults_to_biblioteca() {
        let cli = Cli::try_parse_from(["migrator", "allocate"]).unwrap();
        match cli.command {
            Commands::Allocate { name, base_dir } => {
                assert_eq!(name, "biblioteca");
                assert!(base_dir.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["migrator", "watch", "--once", "-v", "--config", "m.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("m.toml")));
        assert!(matches!(cli.command, Commands::Watch { once: true, workspace: None }));
    }
}
