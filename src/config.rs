// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup and is
//! immutable afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GATEWAY_IPC_PATH` | Unix socket serving the gRPC API | `crux.ipc` |
//! | `GATEWAY_HTTP_IPC_PATH` | Unix socket serving the legacy HTTP API | Disabled |
//! | `GATEWAY_HOST` | REST gateway bind address | `127.0.0.1` |
//! | `GATEWAY_PORT` | REST gateway port | `9020` |
//! | `GATEWAY_TLS_CERT` | Server certificate (PEM); enables mutual TLS | Disabled |
//! | `GATEWAY_TLS_KEY` | Server private key (PEM) | Required with cert |
//! | `GATEWAY_TLS_CA` | CA bundle for client certificates (PEM) | `GATEWAY_TLS_CERT` |
//! | `NODE_SOCKET` | Node socket the client connects to | `crux.ipc` |
//! | `NODE_USE_GRPC` | Use the gRPC transport instead of Unix HTTP | `false` |
//! | `NODE_BINARY` | External node binary to launch | Disabled |
//! | `NODE_CONFIG` | Config path passed to the node binary | None |
//! | `NODE_CALL_TIMEOUT_MS` | Deadline for each gRPC call | `5000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::{ClientOptions, TransportKind};

pub const IPC_PATH_ENV: &str = "GATEWAY_IPC_PATH";
pub const HTTP_IPC_PATH_ENV: &str = "GATEWAY_HTTP_IPC_PATH";
pub const HOST_ENV: &str = "GATEWAY_HOST";
pub const PORT_ENV: &str = "GATEWAY_PORT";
pub const TLS_CERT_ENV: &str = "GATEWAY_TLS_CERT";
pub const TLS_KEY_ENV: &str = "GATEWAY_TLS_KEY";
pub const TLS_CA_ENV: &str = "GATEWAY_TLS_CA";

pub const NODE_SOCKET_ENV: &str = "NODE_SOCKET";
pub const NODE_USE_GRPC_ENV: &str = "NODE_USE_GRPC";
pub const NODE_BINARY_ENV: &str = "NODE_BINARY";
pub const NODE_CONFIG_ENV: &str = "NODE_CONFIG";
pub const NODE_CALL_TIMEOUT_ENV: &str = "NODE_CALL_TIMEOUT_MS";

/// Logging format selector (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_IPC_PATH: &str = "crux.ipc";
pub const DEFAULT_PORT: u16 = 9020;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

/// Certificate material for the mutual-TLS REST gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// CA bundle used to verify client certificates.
    pub ca: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub ipc_path: PathBuf,
    pub http_ipc_path: Option<PathBuf>,
    pub host: IpAddr,
    pub port: u16,
    pub tls: Option<TlsFiles>,
}

impl GatewayConfig {
    /// Plain-mode configuration on loopback.
    pub fn new(ipc_path: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            ipc_path: ipc_path.into(),
            http_ipc_path: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port,
            tls: None,
        }
    }

    pub fn with_tls(mut self, tls: TlsFiles) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_http_ipc(mut self, path: impl Into<PathBuf>) -> Self {
        self.http_ipc_path = Some(path.into());
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ipc_path = lookup(IPC_PATH_ENV).unwrap_or_else(|| DEFAULT_IPC_PATH.to_string());
        let host = match lookup(HOST_ENV) {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: HOST_ENV,
                reason: e.to_string(),
            })?,
            None => IpAddr::from([127, 0, 0, 1]),
        };
        let port = match lookup(PORT_ENV) {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                var: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (lookup(TLS_CERT_ENV), lookup(TLS_KEY_ENV)) {
            (Some(cert), Some(key)) => {
                // Without an explicit bundle the server certificate doubles as the CA.
                let ca = lookup(TLS_CA_ENV).unwrap_or_else(|| cert.clone());
                Some(TlsFiles {
                    cert: cert.into(),
                    key: key.into(),
                    ca: ca.into(),
                })
            }
            (Some(_), None) => return Err(ConfigError::Incomplete(TLS_CERT_ENV, TLS_KEY_ENV)),
            (None, Some(_)) => return Err(ConfigError::Incomplete(TLS_KEY_ENV, TLS_CERT_ENV)),
            (None, None) => None,
        };

        Ok(Self {
            ipc_path: ipc_path.into(),
            http_ipc_path: lookup(HTTP_IPC_PATH_ENV).map(PathBuf::from),
            host,
            port,
            tls,
        })
    }
}

/// Settings for the demonstration client and node launcher.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub socket: PathBuf,
    pub transport: TransportKind,
    pub options: ClientOptions,
    pub node_binary: Option<PathBuf>,
    pub node_config: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let use_grpc = match lookup(NODE_USE_GRPC_ENV).as_deref() {
            None | Some("") | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: NODE_USE_GRPC_ENV,
                    reason: format!("expected true or false, got {other:?}"),
                })
            }
        };

        let mut options = ClientOptions::default();
        if let Some(raw) = lookup(NODE_CALL_TIMEOUT_ENV) {
            let millis: u64 = raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                var: NODE_CALL_TIMEOUT_ENV,
                reason: e.to_string(),
            })?;
            options.call_timeout = Duration::from_millis(millis);
        }

        Ok(Self {
            socket: lookup(NODE_SOCKET_ENV)
                .unwrap_or_else(|| DEFAULT_IPC_PATH.to_string())
                .into(),
            transport: TransportKind::from_use_grpc(use_grpc),
            options,
            node_binary: lookup(NODE_BINARY_ENV).map(PathBuf::from),
            node_config: lookup(NODE_CONFIG_ENV).map(PathBuf::from),
        })
    }
}
