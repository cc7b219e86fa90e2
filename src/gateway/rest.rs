// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! REST → gRPC transcoding gateway.
//!
//! Each handler turns a JSON request into the matching RPC, calls the bridge
//! listener through a gRPC channel, and renders the reply with the proto3
//! JSON mapping (bytes fields are standard base64). RPC failures become
//! failed HTTP responses; they never take the listener down.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tonic::transport::Channel;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::proto::{self, EnclaveRpcClient};

#[derive(Clone)]
pub struct RestState {
    client: EnclaveRpcClient<Channel>,
}

impl RestState {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: EnclaveRpcClient::new(channel),
        }
    }
}

/// Serde adapter for proto3 `bytes` fields.
mod base64_bytes {
    use base64ct::{Base64, Encoding};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Base64::decode_vec(&encoded).map_err(|_| D::Error::custom("invalid base64"))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpcheckBody {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VersionBody {
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendBody {
    /// Base64 payload.
    #[serde(with = "base64_bytes", default)]
    #[schema(value_type = String, format = Byte)]
    pub payload: Vec<u8>,
    /// Base64 sender identity; may be empty.
    #[serde(default)]
    pub from: String,
    /// Base64 recipient identities, in order.
    #[serde(default)]
    pub to: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KeyBody {
    #[serde(with = "base64_bytes")]
    #[schema(value_type = String, format = Byte)]
    pub key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiveBody {
    #[serde(with = "base64_bytes")]
    #[schema(value_type = String, format = Byte)]
    pub key: Vec<u8>,
    /// Identity asking for the payload; empty for node-local retrieval.
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PayloadBody {
    #[serde(with = "base64_bytes")]
    #[schema(value_type = String, format = Byte)]
    pub payload: Vec<u8>,
}

pub fn router(state: RestState) -> Router {
    let routes = Router::new()
        .route("/upcheck", get(upcheck))
        .route("/version", get(version))
        .route("/send", post(send))
        .route("/receive", post(receive))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Health check transcoded to the `Upcheck` RPC.
#[utoipa::path(
    get,
    path = "/upcheck",
    tag = "Enclave",
    responses(
        (status = 200, description = "Enclave is up", body = UpcheckBody),
        (status = 503, description = "Bridge unavailable")
    )
)]
pub async fn upcheck(State(state): State<RestState>) -> Result<Json<UpcheckBody>, ApiError> {
    let mut client = state.client;
    let reply = client
        .upcheck(proto::UpCheckResponse::default())
        .await?
        .into_inner();
    Ok(Json(UpcheckBody {
        message: reply.message,
    }))
}

#[utoipa::path(
    get,
    path = "/version",
    tag = "Enclave",
    responses((status = 200, description = "API version", body = VersionBody))
)]
pub async fn version(State(state): State<RestState>) -> Result<Json<VersionBody>, ApiError> {
    let mut client = state.client;
    let reply = client.version(proto::ApiVersion::default()).await?.into_inner();
    Ok(Json(VersionBody {
        version: reply.version,
    }))
}

/// Store a payload for a set of recipients.
#[utoipa::path(
    post,
    path = "/send",
    tag = "Enclave",
    request_body = SendBody,
    responses(
        (status = 200, description = "Payload stored", body = KeyBody),
        (status = 400, description = "Malformed body or invalid identities")
    )
)]
pub async fn send(
    State(state): State<RestState>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Result<Json<KeyBody>, ApiError> {
    let Json(body) = body?;
    let mut client = state.client;
    let reply = client
        .send(proto::SendRequest {
            payload: body.payload,
            from: body.from,
            to: body.to,
        })
        .await?
        .into_inner();
    Ok(Json(KeyBody { key: reply.key }))
}

/// Retrieve a payload by key.
#[utoipa::path(
    post,
    path = "/receive",
    tag = "Enclave",
    request_body = ReceiveBody,
    responses(
        (status = 200, description = "Payload released", body = PayloadBody),
        (status = 400, description = "Malformed body"),
        (status = 403, description = "Identity is not a party"),
        (status = 404, description = "Unknown key")
    )
)]
pub async fn receive(
    State(state): State<RestState>,
    body: Result<Json<ReceiveBody>, JsonRejection>,
) -> Result<Json<PayloadBody>, ApiError> {
    let Json(body) = body?;
    let mut client = state.client;
    let reply = client
        .receive(proto::ReceiveRequest {
            key: body.key,
            to: body.to,
        })
        .await?
        .into_inner();
    Ok(Json(PayloadBody {
        payload: reply.payload,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(upcheck, version, send, receive),
    components(schemas(UpcheckBody, VersionBody, SendBody, KeyBody, ReceiveBody, PayloadBody)),
    tags((name = "Enclave", description = "Payload storage and retrieval"))
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tonic::transport::Endpoint;
    use tower::ServiceExt;

    #[test]
    fn bytes_fields_use_base64() {
        let body: SendBody =
            serde_json::from_str(r#"{"payload":"cGF5bG9hZA==","to":["b1","b2"]}"#).unwrap();
        assert_eq!(body.payload, b"payload");
        assert_eq!(body.from, "");
        assert_eq!(body.to, vec!["b1", "b2"]);

        let json = serde_json::to_string(&KeyBody { key: vec![0xde, 0xad, 0xbe, 0xef] }).unwrap();
        assert_eq!(json, r#"{"key":"3q2+7w=="}"#);
    }

    #[tokio::test]
    async fn dead_bridge_fails_cleanly() {
        let port = crate::gateway::port::free_port().unwrap();
        let channel = Endpoint::from_shared(format!("http://127.0.0.1:{port}"))
            .unwrap()
            .connect_timeout(Duration::from_millis(200))
            .timeout(Duration::from_secs(1))
            .connect_lazy();
        let app = router(RestState::new(channel));

        let response = tokio::time::timeout(
            Duration::from_secs(5),
            app.oneshot(Request::get("/upcheck").body(Body::empty()).unwrap()),
        )
        .await
        .expect("request must not hang")
        .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], tonic::Code::Unavailable as i32);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_before_the_bridge() {
        let channel = Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        let app = router(RestState::new(channel));

        let response = app
            .oneshot(
                Request::post("/send")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"payload":"%%%"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], tonic::Code::InvalidArgument as i32);
        assert!(json["error"].as_str().unwrap().contains("base64"));
    }

    #[tokio::test]
    async fn receive_without_key_is_json_bad_request() {
        let channel = Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        let app = router(RestState::new(channel));

        let response = app
            .oneshot(
                Request::post("/receive")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"to":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
