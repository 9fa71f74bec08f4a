// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// imgflow — serve the image operation engine over HTTP.
//
// Usage: `imgflow [config.json]`. The config path may also come from
// `IMGFLOW_CONFIG`; `IMGFLOW_*` variables override individual fields.

use std::path::PathBuf;
use std::process::ExitCode;

use imgflow_core::config::ENV_CONFIG_PATH;
use imgflow_core::{ImgflowError, ServerConfig};
use imgflow_server::ProcessServer;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "imgflow starting");

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "imgflow exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<(), ImgflowError> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from));
    let config = ServerConfig::load(config_path.as_deref())?;

    let mut server = ProcessServer::new(config);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        active_connections = server.active_connections(),
        "shutdown requested"
    );
    server.stop().await
}
