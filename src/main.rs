// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use enclave_gateway::{config::GatewayConfig, logging, Gateway, InMemoryEnclave};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        ipc = %config.ipc_path.display(),
        port = config.port,
        tls = config.tls.is_some(),
        "Starting enclave gateway"
    );
    warn!("Using the in-memory enclave; payloads are not encrypted or persisted");

    let mut handle = match Gateway::new(config, Arc::new(InMemoryEnclave::new())).start().await {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Gateway failed to start");
            return ExitCode::FAILURE;
        }
    };

    let outcome = tokio::select! {
        result = handle.wait() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };

    handle.shutdown().await;
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gateway stopped");
            ExitCode::FAILURE
        }
    }
}
