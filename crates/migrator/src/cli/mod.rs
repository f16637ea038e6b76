//! CLI module for the migrator
//!
//! `watch` is the long-running service. The other commands run one step of
//! it by hand: allocate an output root, dispatch one project, classify one
//! project, or check the environment.

pub mod allocate;
pub mod context;
pub mod detect_stack;
pub mod dispatch;
pub mod error;
pub mod preflight;
pub mod watch;

use migrator_dispatch::CancellationToken;
use std::process::ExitCode;
use tracing::info;

/// Cancel `token` on SIGINT/SIGTERM (Ctrl+C on Windows).
pub fn install_shutdown_handler(token: CancellationToken) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        std::thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {}, initiating shutdown...", sig);
                token.cancel();
            }
        });
    }

    #[cfg(windows)]
    {
        ctrlc::set_handler(move || {
            info!("Received Ctrl+C, initiating shutdown...");
            token.cancel();
        })?;
    }

    Ok(())
}

/// Map a child exit code onto a process exit code.
pub fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}
