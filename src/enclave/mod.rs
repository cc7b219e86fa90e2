// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Enclave Capability
//!
//! The enclave encrypts, stores and releases payloads. This crate never
//! looks inside it: every listener receives an `Arc<dyn Enclave>` at
//! construction time and forwards requests to it unchanged.
//!
//! ## Contract
//!
//! - `send(payload, from, to)` returns an opaque key. The recipient list
//!   accepted here is the complete set of parties entitled to the payload.
//! - `receive(key, to)` returns the payload bytes. An empty `to` is a
//!   node-local retrieval.
//!
//! Implementations are shared by every inbound request and must be safe for
//! concurrent invocation.

pub mod memory;

use async_trait::async_trait;

pub use memory::InMemoryEnclave;

/// Errors reported by an enclave backend.
#[derive(Debug, thiserror::Error)]
pub enum EnclaveError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No payload stored under this key")]
    NotFound,

    #[error("Identity is not a party to this payload")]
    PermissionDenied,

    #[error("Enclave unavailable: {0}")]
    Unavailable(String),

    #[error("Internal enclave error: {0}")]
    Internal(String),
}

impl From<EnclaveError> for tonic::Status {
    fn from(err: EnclaveError) -> Self {
        let message = err.to_string();
        match err {
            EnclaveError::InvalidRequest(_) => tonic::Status::invalid_argument(message),
            EnclaveError::NotFound => tonic::Status::not_found(message),
            EnclaveError::PermissionDenied => tonic::Status::permission_denied(message),
            EnclaveError::Unavailable(_) => tonic::Status::unavailable(message),
            EnclaveError::Internal(_) => tonic::Status::internal(message),
        }
    }
}

/// Backend capability object: payload encryption, storage and
/// identity-scoped retrieval.
#[async_trait]
pub trait Enclave: Send + Sync + 'static {
    /// Store `payload` for `to` and return the key that retrieves it.
    async fn send(&self, payload: &[u8], from: &str, to: &[String]) -> Result<Vec<u8>, EnclaveError>;

    /// Release the payload stored under `key`.
    async fn receive(&self, key: &[u8], to: &str) -> Result<Vec<u8>, EnclaveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_grpc_codes() {
        let status: tonic::Status = EnclaveError::NotFound.into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = EnclaveError::InvalidRequest("bad".into()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), "Invalid request: bad");

        let status: tonic::Status = EnclaveError::PermissionDenied.into();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);

        let status: tonic::Status = EnclaveError::Unavailable("down".into()).into();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }
}
