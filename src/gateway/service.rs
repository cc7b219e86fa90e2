// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! gRPC service forwarding the wire contract to the enclave.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::enclave::Enclave;
use crate::proto::{
    ApiVersion, EnclaveRpc, EnclaveRpcServer, ReceiveRequest, ReceiveResponse, SendRequest,
    SendResponse, UpCheckResponse,
};

/// Version reported by the `Version` RPC.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const UPCHECK_MESSAGE: &str = "I'm up!";

#[derive(Clone)]
pub struct EnclaveService {
    enclave: Arc<dyn Enclave>,
}

impl EnclaveService {
    pub fn new(enclave: Arc<dyn Enclave>) -> Self {
        Self { enclave }
    }

    pub fn into_server(self) -> EnclaveRpcServer<Self> {
        EnclaveRpcServer::new(self)
    }
}

#[tonic::async_trait]
impl EnclaveRpc for EnclaveService {
    async fn version(&self, _request: Request<ApiVersion>) -> Result<Response<ApiVersion>, Status> {
        Ok(Response::new(ApiVersion {
            version: API_VERSION.to_string(),
        }))
    }

    async fn upcheck(
        &self,
        _request: Request<UpCheckResponse>,
    ) -> Result<Response<UpCheckResponse>, Status> {
        Ok(Response::new(UpCheckResponse {
            message: UPCHECK_MESSAGE.to_string(),
        }))
    }

    async fn send(&self, request: Request<SendRequest>) -> Result<Response<SendResponse>, Status> {
        let SendRequest { payload, from, to } = request.into_inner();
        let key = self.enclave.send(&payload, &from, &to).await.map_err(|e| {
            tracing::warn!(error = %e, recipients = to.len(), "Enclave send failed");
            Status::from(e)
        })?;
        Ok(Response::new(SendResponse { key }))
    }

    async fn receive(
        &self,
        request: Request<ReceiveRequest>,
    ) -> Result<Response<ReceiveResponse>, Status> {
        let ReceiveRequest { key, to } = request.into_inner();
        let payload = self.enclave.receive(&key, &to).await.map_err(|e| {
            tracing::warn!(error = %e, "Enclave receive failed");
            Status::from(e)
        })?;
        Ok(Response::new(ReceiveResponse { payload }))
    }
}
