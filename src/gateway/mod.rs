// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway Bootstrap
//!
//! Brings up every listener that fronts the enclave:
//!
//! ```text
//!   local clients ──gRPC──► Unix socket (ipc_path) ─────────┐
//!   local clients ──HTTP──► Unix socket (http_ipc_path) ────┤
//!                                                           ├──► Enclave
//!   remote peers ──REST/HTTP(S)──► REST gateway             │
//!                                    │ insecure gRPC        │
//!                                    ▼                      │
//!                            bridge (127.0.0.1) ────────────┘
//! ```
//!
//! ## Modes
//!
//! - **Plain**: REST on `host:port`, bridge on `127.0.0.1:port-1`.
//! - **Mutual TLS**: REST terminates TLS and requires a client certificate
//!   signed by the configured CA; the bridge binds an ephemeral loopback port.
//!
//! The bridge never uses TLS. It is only bound on loopback and relies on
//! that for trust.
//!
//! ## Startup order
//!
//! Credentials are loaded first, then the IPC socket, then the bridge. The
//! REST gateway dials the bridge and only starts serving once that dial has
//! succeeded. Any startup failure is returned as a [`GatewayError`] and all
//! listeners started so far are stopped.

pub mod ipc;
pub mod port;
pub mod rest;
pub mod service;
pub mod tls;

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinSet;
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint, Server};
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::enclave::Enclave;

pub use port::free_port;
pub use service::EnclaveService;
pub use tls::TlsError;

/// Dial timeout for the REST gateway's connection to the bridge.
const BRIDGE_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on one transcoded call.
const BRIDGE_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Time in-flight HTTPS requests get to finish on shutdown.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to listen on {}: {source}", path.display())]
    IpcBind { path: PathBuf, source: io::Error },

    #[error("failed to listen on {addr}: {source}")]
    TcpBind { addr: SocketAddr, source: io::Error },

    #[error("gateway port {0} leaves no room for the bridge port below it")]
    InvalidPort(u16),

    #[error(transparent)]
    CredentialLoad(#[from] TlsError),

    #[error("could not connect REST gateway to bridge at {addr}: {source}")]
    Bridge {
        addr: SocketAddr,
        source: tonic::transport::Error,
    },

    #[error("REST listener failed to start on {0}")]
    RestStart(SocketAddr),

    #[error("{listener} listener stopped: {reason}")]
    ListenerStopped {
        listener: &'static str,
        reason: String,
    },
}

type ListenerExit = (&'static str, Result<(), String>);

/// Bootstrap for the gateway listeners.
pub struct Gateway {
    config: GatewayConfig,
    enclave: Arc<dyn Enclave>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, enclave: Arc<dyn Enclave>) -> Self {
        Self { config, enclave }
    }

    /// Start every listener and return once the REST gateway is serving.
    ///
    /// On failure, socket files bound so far are removed.
    pub async fn start(self) -> Result<GatewayHandle, GatewayError> {
        let tls_config = match &self.config.tls {
            Some(files) => Some(tls::mutual_tls_config(files)?),
            None => None,
        };

        let result = self.bring_up(tls_config).await;
        if result.is_err() {
            remove_socket_files(&self.config.ipc_path, self.config.http_ipc_path.as_deref());
        }
        result
    }

    async fn bring_up(
        &self,
        tls_config: Option<rustls::ServerConfig>,
    ) -> Result<GatewayHandle, GatewayError> {
        let shutdown = CancellationToken::new();
        // Stops whatever was already spawned if startup bails out early.
        let guard = shutdown.clone().drop_guard();
        let mut listeners = JoinSet::new();
        let service = EnclaveService::new(Arc::clone(&self.enclave));

        let ipc = ipc::bind_unix(&self.config.ipc_path).map_err(|source| GatewayError::IpcBind {
            path: self.config.ipc_path.clone(),
            source,
        })?;
        info!(path = %self.config.ipc_path.display(), "Serving gRPC API on IPC socket");
        listeners.spawn(serve_grpc_unix(service.clone(), ipc, shutdown.child_token()));

        if let Some(path) = &self.config.http_ipc_path {
            let listener = ipc::bind_unix(path).map_err(|source| GatewayError::IpcBind {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "Serving HTTP API on IPC socket");
            listeners.spawn(serve_http_unix(
                ipc::router(Arc::clone(&self.enclave)),
                listener,
                shutdown.child_token(),
            ));
        }

        let bridge_bind = match tls_config {
            Some(_) => SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            None => {
                let port = self
                    .config
                    .port
                    .checked_sub(1)
                    .filter(|p| *p > 0)
                    .ok_or(GatewayError::InvalidPort(self.config.port))?;
                SocketAddr::from((Ipv4Addr::LOCALHOST, port))
            }
        };
        let bridge = TcpListener::bind(bridge_bind)
            .await
            .map_err(|source| GatewayError::TcpBind {
                addr: bridge_bind,
                source,
            })?;
        let bridge_addr = bridge.local_addr().map_err(|source| GatewayError::TcpBind {
            addr: bridge_bind,
            source,
        })?;
        info!(addr = %bridge_addr, "Serving gRPC bridge on loopback");
        listeners.spawn(serve_grpc_tcp(service, bridge, shutdown.child_token()));

        let channel = dial_bridge(bridge_addr).await?;
        let app = rest::router(rest::RestState::new(channel));
        let rest_bind = SocketAddr::new(self.config.host, self.config.port);

        let rest_addr = match tls_config {
            None => {
                let listener = TcpListener::bind(rest_bind)
                    .await
                    .map_err(|source| GatewayError::TcpBind {
                        addr: rest_bind,
                        source,
                    })?;
                let addr = listener.local_addr().map_err(|source| GatewayError::TcpBind {
                    addr: rest_bind,
                    source,
                })?;
                let token = shutdown.child_token();
                listeners.spawn(async move {
                    let result = axum::serve(listener, app)
                        .with_graceful_shutdown(token.cancelled_owned())
                        .await
                        .map_err(|e| e.to_string());
                    ("rest", result)
                });
                info!(addr = %addr, "Started HTTP/1.1 REST gateway");
                addr
            }
            Some(config) => {
                let handle = axum_server::Handle::new();
                let server = axum_server::bind_rustls(
                    rest_bind,
                    RustlsConfig::from_config(Arc::new(config)),
                )
                .handle(handle.clone());
                listeners.spawn(async move {
                    let result = server
                        .serve(app.into_make_service())
                        .await
                        .map_err(|e| e.to_string());
                    ("rest-tls", result)
                });

                let token = shutdown.child_token();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    token.cancelled().await;
                    shutdown_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
                });

                let addr = handle
                    .listening()
                    .await
                    .ok_or(GatewayError::RestStart(rest_bind))?;
                info!(addr = %addr, "Started HTTPS REST gateway with client certificate verification");
                addr
            }
        };

        guard.disarm();
        Ok(GatewayHandle {
            ipc_path: self.config.ipc_path.clone(),
            http_ipc_path: self.config.http_ipc_path.clone(),
            bridge_addr,
            rest_addr,
            shutdown,
            listeners,
        })
    }
}

async fn dial_bridge(addr: SocketAddr) -> Result<Channel, GatewayError> {
    let endpoint = Endpoint::from_shared(format!("http://{addr}"))
        .map_err(|source| GatewayError::Bridge { addr, source })?
        .connect_timeout(BRIDGE_CONNECT_TIMEOUT)
        .timeout(BRIDGE_CALL_TIMEOUT);
    endpoint
        .connect()
        .await
        .map_err(|source| GatewayError::Bridge { addr, source })
}

async fn serve_grpc_unix(
    service: EnclaveService,
    listener: UnixListener,
    shutdown: CancellationToken,
) -> ListenerExit {
    let result = Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown.cancelled_owned())
        .await
        .map_err(|e| e.to_string());
    ("grpc-ipc", result)
}

async fn serve_grpc_tcp(
    service: EnclaveService,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> ListenerExit {
    let result = Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.cancelled_owned())
        .await
        .map_err(|e| e.to_string());
    ("grpc-bridge", result)
}

async fn serve_http_unix(
    app: axum::Router,
    listener: UnixListener,
    shutdown: CancellationToken,
) -> ListenerExit {
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| e.to_string());
    ("http-ipc", result)
}

/// Running gateway. Dropping it stops every listener.
pub struct GatewayHandle {
    ipc_path: PathBuf,
    http_ipc_path: Option<PathBuf>,
    bridge_addr: SocketAddr,
    rest_addr: SocketAddr,
    shutdown: CancellationToken,
    listeners: JoinSet<ListenerExit>,
}

impl GatewayHandle {
    pub fn ipc_path(&self) -> &Path {
        &self.ipc_path
    }

    pub fn http_ipc_path(&self) -> Option<&Path> {
        self.http_ipc_path.as_deref()
    }

    pub fn bridge_addr(&self) -> SocketAddr {
        self.bridge_addr
    }

    pub fn rest_addr(&self) -> SocketAddr {
        self.rest_addr
    }

    /// Token that stops every listener when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait until a listener exits.
    ///
    /// Returns `Ok` only when the exit follows a requested shutdown.
    pub async fn wait(&mut self) -> Result<(), GatewayError> {
        let Some(joined) = self.listeners.join_next().await else {
            return Ok(());
        };
        let (listener, result) = joined.map_err(|e| GatewayError::ListenerStopped {
            listener: "unknown",
            reason: e.to_string(),
        })?;

        match result {
            Ok(()) if self.shutdown.is_cancelled() => Ok(()),
            Ok(()) => Err(GatewayError::ListenerStopped {
                listener,
                reason: "exited unexpectedly".to_string(),
            }),
            Err(reason) => {
                error!(listener, error = %reason, "Listener failed");
                Err(GatewayError::ListenerStopped { listener, reason })
            }
        }
    }

    /// Stop every listener and remove the IPC socket files.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        while let Some(joined) = self.listeners.join_next().await {
            match joined {
                Ok((listener, Err(reason))) => {
                    warn!(listener, error = %reason, "Listener exited with error during shutdown")
                }
                Ok((listener, Ok(()))) => info!(listener, "Listener stopped"),
                Err(e) => warn!(error = %e, "Listener task failed during shutdown"),
            }
        }

        remove_socket_files(&self.ipc_path, self.http_ipc_path.as_deref());
    }
}

fn remove_socket_files(ipc_path: &Path, http_ipc_path: Option<&Path>) {
    for path in std::iter::once(ipc_path).chain(http_ipc_path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
