// SPDX-License-Identifier: MIT

use mb_daemon::{env, lifecycle, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _guard = match logging::init_service_logging(&env::log_dir()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let startup = match lifecycle::startup().await {
        Ok(startup) => startup,
        Err(e) => {
            error!(error = %e, "daemon failed to start");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!("maxbackupd started");

    let supervisor = startup.supervisor;
    let socket_path = startup.socket_path;

    tokio::select! {
        _ = startup.listener.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    lifecycle::shutdown(&supervisor, &socket_path).await;
    std::process::ExitCode::SUCCESS
}
