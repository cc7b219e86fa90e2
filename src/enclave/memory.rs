// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory enclave for development and tests.
//!
//! Payloads are kept in process memory and are NOT encrypted. Keys are the
//! SHA-512 digest of a random nonce followed by the payload, so two sends of
//! the same payload yield distinct keys.

use std::collections::HashMap;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha512};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Enclave, EnclaveError};

#[derive(Debug, Clone)]
struct StoredPayload {
    payload: Vec<u8>,
    from: String,
    to: Vec<String>,
}

impl StoredPayload {
    fn is_party(&self, identity: &str) -> bool {
        self.from == identity || self.to.iter().any(|r| r == identity)
    }
}

#[derive(Default)]
pub struct InMemoryEnclave {
    payloads: RwLock<HashMap<Vec<u8>, StoredPayload>>,
}

impl InMemoryEnclave {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads.
    pub async fn len(&self) -> usize {
        self.payloads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payloads.read().await.is_empty()
    }

    /// Recipients recorded for `key`, in the order they were sent.
    pub async fn recipients(&self, key: &[u8]) -> Option<Vec<String>> {
        self.payloads.read().await.get(key).map(|p| p.to.clone())
    }
}

fn validate_identity(identity: &str) -> Result<(), EnclaveError> {
    if identity.is_empty() {
        return Err(EnclaveError::InvalidRequest("empty identity".into()));
    }
    Base64::decode_vec(identity)
        .map(|_| ())
        .map_err(|_| EnclaveError::InvalidRequest("identity is not valid base64".into()))
}

fn derive_key(payload: &[u8]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(payload);
    hasher.finalize().to_vec()
}

#[async_trait]
impl Enclave for InMemoryEnclave {
    async fn send(&self, payload: &[u8], from: &str, to: &[String]) -> Result<Vec<u8>, EnclaveError> {
        if !from.is_empty() {
            validate_identity(from)?;
        }
        for recipient in to {
            validate_identity(recipient)?;
        }

        let key = derive_key(payload);
        let stored = StoredPayload {
            payload: payload.to_vec(),
            from: from.to_string(),
            to: to.to_vec(),
        };
        self.payloads.write().await.insert(key.clone(), stored);

        tracing::debug!(recipients = to.len(), "Stored payload");
        Ok(key)
    }

    async fn receive(&self, key: &[u8], to: &str) -> Result<Vec<u8>, EnclaveError> {
        let payloads = self.payloads.read().await;
        let stored = payloads.get(key).ok_or(EnclaveError::NotFound)?;

        if !to.is_empty() && !stored.is_party(to) {
            return Err(EnclaveError::PermissionDenied);
        }
        Ok(stored.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER: &str = "zSifTnkv5r4K67Dq304eVcM4FpxGfHLe1yTCBm0/7wg=";
    const RECEIVER: &str = "a6AW4RRp+zmxeq9jg9fHdThv4wW1F1NiH1YAW4D1jVY=";

    #[tokio::test]
    async fn send_then_receive_returns_payload() {
        let enclave = InMemoryEnclave::new();
        let key = enclave
            .send(b"payload", SENDER, &[RECEIVER.to_string()])
            .await
            .unwrap();
        assert_eq!(key.len(), 64);

        let payload = enclave.receive(&key, "").await.unwrap();
        assert_eq!(payload, b"payload");
        assert_eq!(enclave.receive(&key, RECEIVER).await.unwrap(), b"payload");
        assert_eq!(enclave.receive(&key, SENDER).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn same_payload_gets_distinct_keys() {
        let enclave = InMemoryEnclave::new();
        let a = enclave.send(b"same", "", &[]).await.unwrap();
        let b = enclave.send(b"same", "", &[]).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(enclave.len().await, 2);
    }

    #[tokio::test]
    async fn empty_send_is_accepted() {
        let enclave = InMemoryEnclave::new();
        let key = enclave.send(b"", "", &[]).await.unwrap();
        assert!(enclave.receive(&key, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let enclave = InMemoryEnclave::new();
        let err = enclave.receive(b"missing", "").await.unwrap_err();
        assert!(matches!(err, EnclaveError::NotFound));
    }

    #[tokio::test]
    async fn outsider_cannot_receive() {
        let enclave = InMemoryEnclave::new();
        let key = enclave
            .send(b"secret", SENDER, &[RECEIVER.to_string()])
            .await
            .unwrap();
        let outsider = "QfeDAys9MPDs2XHExtc84jKGHxZg/aj52DTh0vtA3Xc=";
        let err = enclave.receive(&key, outsider).await.unwrap_err();
        assert!(matches!(err, EnclaveError::PermissionDenied));
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected() {
        let enclave = InMemoryEnclave::new();
        let err = enclave
            .send(b"p", "", &["not base64!".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EnclaveError::InvalidRequest(_)));
        assert!(enclave.is_empty().await);
    }

    #[tokio::test]
    async fn recipient_order_is_kept() {
        let enclave = InMemoryEnclave::new();
        let to = vec![RECEIVER.to_string(), SENDER.to_string()];
        let key = enclave.send(b"p", "", &to).await.unwrap();
        assert_eq!(enclave.recipients(&key).await.unwrap(), to);
    }
}
