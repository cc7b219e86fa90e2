// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Enclave Client
//!
//! Transport-agnostic access to a node's enclave API. A [`Client`] is built
//! once with either the Unix-socket HTTP transport or the gRPC transport and
//! keeps that transport for its whole lifetime; there is no failover between
//! them.
//!
//! ## Wire differences hidden by the facade
//!
//! | Operation | Unix HTTP | gRPC |
//! |-----------|-----------|------|
//! | UpCheck | `GET /upcheck`, 200 = up | `Upcheck` RPC |
//! | Send | `POST /sendraw`, raw body, base64 key in response | `Send` RPC, raw bytes |
//! | Receive | `GET /receiveraw`, base64 key header, raw body | `Receive` RPC, raw bytes |

pub mod grpc;
pub mod unix_http;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};

pub use grpc::GrpcTransport;
pub use unix_http::UnixHttpTransport;

/// Default per-call deadline for gRPC calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque key returned by a send and required to receive.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PayloadKey(Vec<u8>);

impl PayloadKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Standard (padded) base64 form, as used in `c11n-key` headers.
    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, ClientError> {
        Base64::decode_vec(encoded.trim())
            .map(Self)
            .map_err(|e| ClientError::Encoding(format!("invalid base64 key: {e}")))
    }
}

impl From<Vec<u8>> for PayloadKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadKey({})", self.to_base64())
    }
}

/// Errors returned by [`Client`] operations.
///
/// Messages describe the failing stage only; payload bytes never appear in
/// them.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Node unreachable: {0}")]
    Unreachable(String),

    #[error("Node returned non-success status {0}")]
    NonSuccessStatus(u16),

    #[error("RPC failed ({code:?}): {message}")]
    RpcFailure { code: tonic::Code, message: String },

    #[error("Malformed response: {0}")]
    Encoding(String),
}

impl ClientError {
    /// Which stage of the call failed.
    pub fn stage(&self) -> &'static str {
        match self {
            ClientError::Unreachable(_) | ClientError::RpcFailure { .. } => "transport",
            ClientError::NonSuccessStatus(_) => "status",
            ClientError::Encoding(_) => "encoding",
        }
    }
}

impl From<tonic::Status> for ClientError {
    fn from(status: tonic::Status) -> Self {
        ClientError::RpcFailure {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// A concrete channel to the node.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which transport this is.
    fn kind(&self) -> TransportKind;

    /// Single health-check round trip.
    async fn upcheck(&self) -> Result<(), ClientError>;

    async fn send(&self, payload: &[u8], from: &str, to: &[String]) -> Result<PayloadKey, ClientError>;

    async fn receive(&self, key: &PayloadKey) -> Result<Vec<u8>, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    UnixHttp,
    Grpc,
}

impl TransportKind {
    pub fn from_use_grpc(use_grpc: bool) -> Self {
        if use_grpc {
            TransportKind::Grpc
        } else {
            TransportKind::UnixHttp
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::UnixHttp => write!(f, "unix-http"),
            TransportKind::Grpc => write!(f, "grpc"),
        }
    }
}

/// Caller-tunable client settings.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Deadline attached to every gRPC call.
    pub call_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Bounded retry schedule for waiting on a node to come up.
#[derive(Debug, Clone)]
pub struct ReadinessPolicy {
    /// Delay before the first probe.
    pub initial_delay: Duration,
    /// Maximum number of probes.
    pub max_attempts: u32,
    /// Backoff after the first failed probe; doubles up to `max_backoff`.
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_attempts: 10,
            backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl ReadinessPolicy {
    /// Delay before the probe numbered `attempt` (0-based, after the first).
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Transport-agnostic enclave client.
///
/// Cloning is cheap and clones share the underlying connection. Concurrent
/// calls on one client may complete in any order.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Create a client for the node socket at `endpoint`.
    ///
    /// Must be called from within a Tokio runtime. The gRPC transport
    /// connects lazily, so this never fails; errors surface on first call.
    pub fn new(endpoint: impl AsRef<Path>, use_grpc: bool) -> Self {
        Self::with_options(
            endpoint,
            TransportKind::from_use_grpc(use_grpc),
            ClientOptions::default(),
        )
    }

    pub fn with_options(
        endpoint: impl AsRef<Path>,
        kind: TransportKind,
        options: ClientOptions,
    ) -> Self {
        let endpoint = endpoint.as_ref();
        let transport: Arc<dyn Transport> = match kind {
            TransportKind::UnixHttp => Arc::new(UnixHttpTransport::new(endpoint)),
            TransportKind::Grpc => Arc::new(GrpcTransport::new(endpoint, options.call_timeout)),
        };
        tracing::debug!(endpoint = %endpoint.display(), transport = %kind, "Created enclave client");
        Self { transport }
    }

    /// Wrap an already-built transport.
    pub fn from_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub async fn upcheck(&self) -> Result<(), ClientError> {
        self.transport.upcheck().await
    }

    /// Send `payload` from `from` (may be empty) to `to`, in order.
    pub async fn send_payload(
        &self,
        payload: &[u8],
        from: &str,
        to: &[String],
    ) -> Result<PayloadKey, ClientError> {
        self.transport.send(payload, from, to).await
    }

    pub async fn receive_payload(&self, key: &PayloadKey) -> Result<Vec<u8>, ClientError> {
        self.transport.receive(key).await
    }

    /// Poll `upcheck` until it succeeds or `policy` is exhausted.
    ///
    /// Returns the last probe error when every attempt fails.
    pub async fn wait_until_ready(&self, policy: &ReadinessPolicy) -> Result<(), ClientError> {
        tokio::time::sleep(policy.initial_delay).await;

        let attempts = policy.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(policy.backoff_for(attempt - 1)).await;
            }
            match self.upcheck().await {
                Ok(()) => {
                    tracing::info!(attempt = attempt + 1, transport = %self.kind(), "Node is ready");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(attempt = attempt + 1, error = %e, "Node not ready yet");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::Unreachable("no probe attempted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyTransport {
        failures_left: AtomicU32,
        probes: AtomicU32,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::UnixHttp
        }

        async fn upcheck(&self) -> Result<(), ClientError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left == 0 {
                return Ok(());
            }
            self.failures_left.store(left - 1, Ordering::SeqCst);
            Err(ClientError::Unreachable("connection refused".into()))
        }

        async fn send(&self, _: &[u8], _: &str, _: &[String]) -> Result<PayloadKey, ClientError> {
            Ok(PayloadKey::new(vec![1]))
        }

        async fn receive(&self, _: &PayloadKey) -> Result<Vec<u8>, ClientError> {
            Ok(Vec::new())
        }
    }

    fn fast_policy(max_attempts: u32) -> ReadinessPolicy {
        ReadinessPolicy {
            initial_delay: Duration::ZERO,
            max_attempts,
            backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn payload_key_base64_round_trip() {
        let key = PayloadKey::new(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(key.to_base64(), "3q2+7w==");
        assert_eq!(PayloadKey::from_base64("3q2+7w==\n").unwrap(), key);
        assert!(matches!(
            PayloadKey::from_base64("not base64"),
            Err(ClientError::Encoding(_))
        ));
    }

    #[test]
    fn error_stages() {
        assert_eq!(ClientError::Unreachable("x".into()).stage(), "transport");
        assert_eq!(ClientError::NonSuccessStatus(500).stage(), "status");
        assert_eq!(ClientError::Encoding("x".into()).stage(), "encoding");
        let rpc: ClientError = tonic::Status::unavailable("down").into();
        assert_eq!(rpc.stage(), "transport");
    }

    #[test]
    fn backoff_is_capped() {
        let policy = fast_policy(5);
        assert_eq!(policy.backoff_for(0), Duration::from_millis(1));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(2));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(4));
        assert_eq!(policy.backoff_for(30), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn wait_until_ready_retries_until_up() {
        let transport = Arc::new(FlakyTransport {
            failures_left: AtomicU32::new(2),
            probes: AtomicU32::new(0),
        });
        let client = Client::from_transport(transport.clone());

        client.wait_until_ready(&fast_policy(5)).await.unwrap();
        assert_eq!(transport.probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wait_until_ready_gives_up_after_max_attempts() {
        let transport = Arc::new(FlakyTransport {
            failures_left: AtomicU32::new(100),
            probes: AtomicU32::new(0),
        });
        let client = Client::from_transport(transport.clone());

        let err = client.wait_until_ready(&fast_policy(3)).await.unwrap_err();
        assert!(matches!(err, ClientError::Unreachable(_)));
        assert_eq!(transport.probes.load(Ordering::SeqCst), 3);
    }
}
