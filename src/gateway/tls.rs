// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mutual-TLS credentials for the external REST listener.
//!
//! The server presents its certificate chain and requires every client to
//! present a certificate issued by the configured CA bundle. Clients without
//! one are rejected during the handshake.

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

use crate::config::TlsFiles;

/// TLS material could not be loaded or parsed.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("could not load server key pair: {0}")]
    KeyPair(String),

    #[error("could not read ca certificate: {0}")]
    CaBundle(String),

    #[error("failed to append client certs: {0}")]
    Verifier(String),

    #[error("invalid TLS configuration: {0}")]
    Config(#[from] rustls::Error),
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, String> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| format!("{}: {e}", path.display()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("{}: {e}", path.display()))?;
    if certs.is_empty() {
        return Err(format!("{}: no certificates found", path.display()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, String> {
    PrivateKeyDer::from_pem_file(path).map_err(|e| format!("{}: {e}", path.display()))
}

/// Build a rustls server config that requires and verifies client
/// certificates.
pub fn mutual_tls_config(files: &TlsFiles) -> Result<ServerConfig, TlsError> {
    let chain = load_certs(&files.cert).map_err(TlsError::KeyPair)?;
    let key = load_key(&files.key).map_err(TlsError::KeyPair)?;

    let mut roots = RootCertStore::empty();
    for ca in load_certs(&files.ca).map_err(TlsError::CaBundle)? {
        roots
            .add(ca)
            .map_err(|e| TlsError::CaBundle(e.to_string()))?;
    }

    let provider = provider();
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .map_err(|e| TlsError::Verifier(e.to_string()))?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .map_err(|e| TlsError::KeyPair(e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}
