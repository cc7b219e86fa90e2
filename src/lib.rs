// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave Gateway - access layer for a private transaction manager
//!
//! Accepts payloads for an opaque enclave, returns the key other parties use
//! to retrieve them, and lets local clients reach the enclave over either of
//! two interchangeable transports.
//!
//! ## Modules
//!
//! - `client` - Dual-transport client (Unix HTTP or gRPC over a Unix socket)
//! - `gateway` - gRPC listeners and the REST gateway (plain or mutual TLS)
//! - `enclave` - Backend capability trait and an in-memory implementation
//! - `launcher` - External node process launcher
//! - `config` - Environment configuration

pub mod client;
pub mod config;
pub mod enclave;
pub mod error;
pub mod gateway;
pub mod launcher;
pub mod logging;
pub mod proto;

pub use client::{Client, ClientError, PayloadKey, TransportKind};
pub use enclave::{Enclave, EnclaveError, InMemoryEnclave};
pub use gateway::{Gateway, GatewayError, GatewayHandle};
