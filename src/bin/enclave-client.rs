// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Demonstration client: optionally launches a node, waits for it, then
//! sends a payload three ways and reads the last one back.

use std::process::ExitCode;

use enclave_gateway::{
    client::ReadinessPolicy,
    config::ClientConfig,
    launcher::NodeLauncher,
    logging, Client, ClientError,
};
use tracing::{error, info};

const SENDER: &str = "zSifTnkv5r4K67Dq304eVcM4FpxGfHLe1yTCBm0/7wg=";
const RECEIVER: &str = "a6AW4RRp+zmxeq9jg9fHdThv4wW1F1NiH1YAW4D1jVY=";

async fn exercise(client: &Client) -> Result<(), ClientError> {
    let requests: [(&str, Vec<String>); 3] = [
        (SENDER, vec![RECEIVER.to_string()]),
        ("", Vec::new()),
        ("", vec![RECEIVER.to_string()]),
    ];

    let mut last_key = None;
    for (from, to) in &requests {
        let key = client.send_payload(b"payload", from, to).await?;
        info!(recipients = to.len(), "Payload sent");
        last_key = Some(key);
    }

    if let Some(key) = last_key {
        let payload = client.receive_payload(&key).await?;
        info!(bytes = payload.len(), matches = payload == b"payload", "Payload received");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = Client::with_options(&config.socket, config.transport, config.options.clone());

    let _node = match &config.node_binary {
        Some(binary) => {
            let mut launcher = NodeLauncher::new(binary);
            if let Some(node_config) = &config.node_config {
                launcher = launcher.arg(node_config);
            }
            match launcher.launch(&client).await {
                Ok(node) => Some(node),
                Err(e) => {
                    error!(error = %e, "Node launch failed");
                    return ExitCode::FAILURE;
                }
            }
        }
        None => {
            if let Err(e) = client.wait_until_ready(&ReadinessPolicy::default()).await {
                error!(error = %e, transport = %config.transport, "Node API did not respond to upcheck");
                return ExitCode::FAILURE;
            }
            None
        }
    };

    match exercise(&client).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, stage = e.stage(), "Request failed");
            ExitCode::FAILURE
        }
    }
}
