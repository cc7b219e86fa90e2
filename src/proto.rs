// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Generated protobuf types and service stubs for the enclave wire contract.

#![allow(clippy::doc_markdown)]

tonic::include_proto!("server");

pub use client_client::ClientClient as EnclaveRpcClient;
pub use client_server::{Client as EnclaveRpc, ClientServer as EnclaveRpcServer};
