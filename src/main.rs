//! The main entry point for the Docfan CLI.

#![warn(missing_docs)]

use std::process::ExitCode;

use clap::Parser;
use docfan::cli::{self, Args};

//================================================================================================
// Functions
//================================================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_from(cli::change_directory());
    let Args { log, .. } = args;

    let _guard = cli::init_global_subscriber(log);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            let outstanding = cli::BOARD.snapshot().outstanding();
            if outstanding > 0 {
                tracing::warn!(
                    outstanding,
                    "Ctrl+C received, terminating; calls already sent to the provider may still complete"
                );
            } else {
                tracing::warn!("Ctrl+C received, terminating...");
            }
            ExitCode::FAILURE
        }
        res = cli::run(args) => {
            if let Err(e) = res {
                docfan::fatal!(e);
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
