// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! gRPC over a Unix-domain socket.
//!
//! The channel is addressed through a passthrough connector that ignores the
//! URI and dials the socket path directly. It connects lazily and reconnects
//! on demand; every call carries the configured deadline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use super::unix_http::DIAL_TIMEOUT;
use super::{ClientError, PayloadKey, Transport, TransportKind};
use crate::proto::{EnclaveRpcClient, ReceiveRequest, SendRequest, UpCheckResponse};

/// Placeholder authority; the connector never resolves it.
const PASSTHROUGH_URI: &str = "http://localhost";

pub struct GrpcTransport {
    socket_path: PathBuf,
    client: EnclaveRpcClient<Channel>,
    call_timeout: Duration,
}

impl GrpcTransport {
    /// Build a lazily connecting transport. Must run inside a Tokio runtime.
    pub fn new(socket_path: impl AsRef<Path>, call_timeout: Duration) -> Self {
        let socket_path = socket_path.as_ref().to_path_buf();
        let channel = unix_channel(&socket_path);
        Self {
            socket_path,
            client: EnclaveRpcClient::new(channel),
            call_timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.call_timeout);
        request
    }
}

/// Lazily connecting channel that dials `socket_path` for every connection.
pub fn unix_channel(socket_path: &Path) -> Channel {
    let path = Arc::new(socket_path.to_path_buf());
    Endpoint::from_static(PASSTHROUGH_URI)
        .connect_timeout(DIAL_TIMEOUT)
        .connect_with_connector_lazy(service_fn(move |_: Uri| {
            let path = Arc::clone(&path);
            async move {
                let stream = UnixStream::connect(path.as_path()).await?;
                Ok::<_, std::io::Error>(TokioIo::new(stream))
            }
        }))
}

#[async_trait]
impl Transport for GrpcTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Grpc
    }

    async fn upcheck(&self) -> Result<(), ClientError> {
        let mut client = self.client.clone();
        client
            .upcheck(self.request(UpCheckResponse::default()))
            .await
            .map(|_| ())
            .map_err(|status| {
                ClientError::Unreachable(format!("gRPC upcheck failed: {}", status.message()))
            })
    }

    async fn send(&self, payload: &[u8], from: &str, to: &[String]) -> Result<PayloadKey, ClientError> {
        let mut client = self.client.clone();
        let response = client
            .send(self.request(SendRequest {
                payload: payload.to_vec(),
                from: from.to_string(),
                to: to.to_vec(),
            }))
            .await?;
        Ok(PayloadKey::new(response.into_inner().key))
    }

    async fn receive(&self, key: &PayloadKey) -> Result<Vec<u8>, ClientError> {
        let mut client = self.client.clone();
        let response = client
            .receive(self.request(ReceiveRequest {
                key: key.as_bytes().to_vec(),
                to: String::new(),
            }))
            .await?;
        Ok(response.into_inner().payload)
    }
}
