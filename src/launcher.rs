// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Node Launcher
//!
//! Spawns the external node process and waits until its API answers an
//! upcheck. The node's stderr is forwarded line by line into the log.
//!
//! Readiness is probed with [`Client::wait_until_ready`] rather than a fixed
//! sleep; the policy's initial delay plays the role of the settle time.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::client::{Client, ClientError, ReadinessPolicy};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to spawn {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },

    #[error("node exited before becoming ready ({0})")]
    ExitedEarly(ExitStatus),

    #[error("node did not become ready: {0}")]
    NotReady(#[source] ClientError),
}

pub struct NodeLauncher {
    binary: PathBuf,
    args: Vec<OsString>,
    readiness: ReadinessPolicy,
}

impl NodeLauncher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            readiness: ReadinessPolicy::default(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Spawn the node and wait until `client` gets a successful upcheck.
    ///
    /// The process is killed if it does not become ready.
    pub async fn launch(&self, client: &Client) -> Result<NodeProcess, LaunchError> {
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(target: "node", "{line}");
                }
            });
        }

        info!(binary = %self.binary.display(), pid = ?child.id(), "Launched node");

        let readiness = client.wait_until_ready(&self.readiness).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(LaunchError::ExitedEarly(status));
        }
        if let Err(e) = readiness {
            warn!(error = %e, "Node did not become ready, stopping it");
            if let Err(kill_error) = child.kill().await {
                warn!(error = %kill_error, "Failed to stop unready node");
            }
            return Err(LaunchError::NotReady(e));
        }

        Ok(NodeProcess { child })
    }
}

/// A running node. Dropping it kills the process.
#[derive(Debug)]
pub struct NodeProcess {
    child: Child,
}

impl NodeProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn stop(mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    pub async fn wait(mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }
}
