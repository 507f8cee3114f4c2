// SPDX-License-Identifier: MIT

//! `maxbackup` - thin IPC client for the per-machine backup service.
//!
//! Every subcommand sends one request over the service's Unix domain
//! socket and prints each response's message verbatim as it arrives; there
//! is no table rendering or color, matching the service's own minimal
//! wire contract.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod exit_error;
mod transport;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use mb_wire::Request;

#[derive(Parser)]
#[command(name = "maxbackup", about = "Client for the per-machine backup service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a user for backup and start its worker
    Register {
        /// Security identifier of the user to register
        sid: String,
        /// Path to the user's backup configuration file
        config_path: String,
    },
    /// Stop a user's worker and remove its registration
    Unregister {
        /// Security identifier of the user to unregister
        sid: String,
    },
    /// Report whether a user is registered and its worker's state
    Status {
        /// Security identifier of the user to query
        sid: String,
    },
}

impl Command {
    fn into_request(self) -> Request {
        match self {
            Command::Register { sid, config_path } => {
                Request { action: "REGISTER".into(), sid, config_path: Some(config_path) }
            }
            Command::Unregister { sid } => Request { action: "UNREGISTER".into(), sid, config_path: None },
            Command::Status { sid } => Request { action: "STATUS".into(), sid, config_path: None },
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("maxbackup: {e}");
            let code = e.downcast_ref::<ExitError>().map(|e| e.code).unwrap_or(1);
            std::process::ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let request = cli.command.into_request();
    transport::run_conversation(request).await
}
