//! release_matrix - release orchestration for Rust binaries.
//!
//! This binary gates a push event, builds one binary per catalog target,
//! packages each into an archive and publishes a single release.

use release_matrix::cli;
use std::process::ExitCode;
use tokio::signal::ctrl_c;

/// Exit code when the scheduler interrupts the run (128 + SIGINT)
const INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    // Dropping the run future aborts in-flight cells, kills their toolchains
    // and removes the scratch directory before main returns
    let exit_code = tokio::select! {
        result = cli::run() => match result {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                if let Some(hint) = e.hint() {
                    eprintln!("Hint: {}", hint);
                }
                e.exit_code()
            }
        },
        signal = ctrl_c() => {
            if let Err(e) = signal {
                eprintln!("Error: failed to listen for interrupt: {}", e);
                1
            } else {
                eprintln!("Interrupted; nothing was published");
                INTERRUPTED
            }
        }
    };

    ExitCode::from(u8::try_from(exit_code).unwrap_or(1))
}
