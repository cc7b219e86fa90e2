// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP/1.1 over a Unix-domain socket.
//!
//! Each call opens a fresh connection to the socket. Blocking is bounded by
//! three timeouts: dialing (1s), waiting for response headers (5s) and the
//! whole request including the body (5s).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use super::{ClientError, PayloadKey, Transport, TransportKind};

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(1);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(5);

pub const UPCHECK_PATH: &str = "/upcheck";
pub const SEND_RAW_PATH: &str = "/sendraw";
pub const RECEIVE_RAW_PATH: &str = "/receiveraw";

pub const FROM_HEADER: &str = "c11n-from";
pub const TO_HEADER: &str = "c11n-to";
pub const KEY_HEADER: &str = "c11n-key";

/// Timeout band for one HTTP exchange.
#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    pub dial: Duration,
    pub request: Duration,
    pub response_header: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            dial: DIAL_TIMEOUT,
            request: REQUEST_TIMEOUT,
            response_header: RESPONSE_HEADER_TIMEOUT,
        }
    }
}

struct RawResponse {
    status: StatusCode,
    body: Bytes,
}

pub struct UnixHttpTransport {
    socket_path: PathBuf,
    timeouts: HttpTimeouts,
}

impl UnixHttpTransport {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self::with_timeouts(socket_path, HttpTimeouts::default())
    }

    pub fn with_timeouts(socket_path: impl AsRef<Path>, timeouts: HttpTimeouts) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            timeouts,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn execute(&self, request: Request<Full<Bytes>>) -> Result<RawResponse, ClientError> {
        tokio::time::timeout(self.timeouts.request, self.exchange(request))
            .await
            .map_err(|_| ClientError::Unreachable("request timed out".into()))?
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<RawResponse, ClientError> {
        let stream = tokio::time::timeout(self.timeouts.dial, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| ClientError::Unreachable("dial timed out".into()))?
            .map_err(|e| {
                ClientError::Unreachable(format!("connect {}: {e}", self.socket_path.display()))
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ClientError::Unreachable(format!("handshake failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "Unix HTTP connection closed with error");
            }
        });

        let response = tokio::time::timeout(self.timeouts.response_header, sender.send_request(request))
            .await
            .map_err(|_| ClientError::Unreachable("timed out waiting for response headers".into()))?
            .map_err(|e| ClientError::Unreachable(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ClientError::Unreachable(format!("reading response body: {e}")))?
            .to_bytes();

        Ok(RawResponse { status, body })
    }
}

fn build_request(method: Method, path: &str) -> hyper::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, "localhost")
}

fn finish(
    builder: hyper::http::request::Builder,
    body: Bytes,
) -> Result<Request<Full<Bytes>>, ClientError> {
    builder
        .body(Full::new(body))
        .map_err(|e| ClientError::Encoding(format!("building request: {e}")))
}

fn require_ok(response: &RawResponse) -> Result<(), ClientError> {
    if response.status == StatusCode::OK {
        Ok(())
    } else {
        Err(ClientError::NonSuccessStatus(response.status.as_u16()))
    }
}

#[async_trait]
impl Transport for UnixHttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::UnixHttp
    }

    async fn upcheck(&self) -> Result<(), ClientError> {
        let request = finish(build_request(Method::GET, UPCHECK_PATH), Bytes::new())?;
        let response = self.execute(request).await?;
        if response.status == StatusCode::OK {
            Ok(())
        } else {
            Err(ClientError::Unreachable(format!(
                "upcheck returned status {}",
                response.status.as_u16()
            )))
        }
    }

    async fn send(&self, payload: &[u8], from: &str, to: &[String]) -> Result<PayloadKey, ClientError> {
        let mut builder = build_request(Method::POST, SEND_RAW_PATH)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(TO_HEADER, to.join(","));
        if !from.is_empty() {
            builder = builder.header(FROM_HEADER, from);
        }

        let response = self.execute(finish(builder, Bytes::copy_from_slice(payload))?).await?;
        require_ok(&response)?;

        // The key comes back base64 wrapped even though the payload went out raw.
        let encoded = std::str::from_utf8(&response.body)
            .map_err(|_| ClientError::Encoding("send response is not UTF-8".into()))?;
        PayloadKey::from_base64(encoded)
    }

    async fn receive(&self, key: &PayloadKey) -> Result<Vec<u8>, ClientError> {
        let builder = build_request(Method::GET, RECEIVE_RAW_PATH)
            .header(KEY_HEADER, key.to_base64());

        let response = self.execute(finish(builder, Bytes::new())?).await?;
        require_ok(&response)?;
        Ok(response.body.to_vec())
    }
}

/// Decode a comma-joined `c11n-to` header into an ordered recipient list.
pub fn split_recipients(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Standard base64 encoding used for keys in the HTTP API.
pub fn encode_key(key: &[u8]) -> String {
    Base64::encode_string(key)
}
