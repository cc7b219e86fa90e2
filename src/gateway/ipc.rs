// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legacy HTTP API on a Unix-domain socket.
//!
//! Serves the raw endpoints the Unix HTTP client transport speaks:
//!
//! - `GET /upcheck` → 200
//! - `POST /sendraw` (raw body, `c11n-from`, `c11n-to`) → base64 key
//! - `GET /receiveraw` (`c11n-key`, optional `c11n-to`) → raw payload

use std::io;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use tokio::net::UnixListener;
use tower_http::trace::TraceLayer;

use crate::client::unix_http::{
    encode_key, split_recipients, FROM_HEADER, KEY_HEADER, RECEIVE_RAW_PATH, SEND_RAW_PATH,
    TO_HEADER, UPCHECK_PATH,
};
use crate::enclave::Enclave;
use crate::error::ApiError;
use crate::gateway::service::UPCHECK_MESSAGE;

#[derive(Clone)]
struct IpcState {
    enclave: Arc<dyn Enclave>,
}

pub fn router(enclave: Arc<dyn Enclave>) -> Router {
    Router::new()
        .route(UPCHECK_PATH, get(upcheck))
        .route(SEND_RAW_PATH, post(send_raw))
        .route(RECEIVE_RAW_PATH, get(receive_raw))
        .layer(TraceLayer::new_for_http())
        .with_state(IpcState { enclave })
}

/// Bind a Unix socket at `path`, replacing a stale socket file if present.
pub fn bind_unix(path: &Path) -> io::Result<UnixListener> {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed stale socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(path)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| ApiError::bad_request(format!("{name} header is not valid text")))
        })
        .transpose()
}

async fn upcheck() -> &'static str {
    UPCHECK_MESSAGE
}

async fn send_raw(
    State(state): State<IpcState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, ApiError> {
    let from = header(&headers, FROM_HEADER)?.unwrap_or_default();
    let to = header(&headers, TO_HEADER)?
        .map(split_recipients)
        .unwrap_or_default();

    let key = state.enclave.send(&body, from, &to).await?;
    Ok(encode_key(&key))
}

async fn receive_raw(
    State(state): State<IpcState>,
    headers: HeaderMap,
) -> Result<Vec<u8>, ApiError> {
    let encoded = header(&headers, KEY_HEADER)?
        .ok_or_else(|| ApiError::bad_request(format!("{KEY_HEADER} header is required")))?;
    let key = Base64::decode_vec(encoded.trim())
        .map_err(|_| ApiError::bad_request(format!("{KEY_HEADER} is not valid base64")))?;
    let to = header(&headers, TO_HEADER)?.unwrap_or_default();

    Ok(state.enclave.receive(&key, to).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::enclave::InMemoryEnclave;

    const RECEIVER: &str = "a6AW4RRp+zmxeq9jg9fHdThv4wW1F1NiH1YAW4D1jVY=";

    async fn body_of(response: axum::response::Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn send_then_receive_over_router() {
        let enclave = Arc::new(InMemoryEnclave::new());
        let app = router(enclave.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/sendraw")
                    .header(TO_HEADER, RECEIVER)
                    .body(Body::from("payload"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let encoded_key = String::from_utf8(body_of(response).await).unwrap();
        let key = Base64::decode_vec(&encoded_key).unwrap();
        assert_eq!(enclave.recipients(&key).await.unwrap(), vec![RECEIVER]);

        let response = app
            .oneshot(
                Request::get("/receiveraw")
                    .header(KEY_HEADER, encoded_key)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, b"payload");
    }

    #[tokio::test]
    async fn receive_without_key_is_bad_request() {
        let app = router(Arc::new(InMemoryEnclave::new()));
        let response = app
            .oneshot(Request::get("/receiveraw").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn receive_unknown_key_is_not_found() {
        let app = router(Arc::new(InMemoryEnclave::new()));
        let response = app
            .oneshot(
                Request::get("/receiveraw")
                    .header(KEY_HEADER, "3q2+7w==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bind_unix_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.ipc");
        std::fs::write(&path, b"").unwrap();
        let _listener = bind_unix(&path).unwrap();
        assert!(path.exists());
    }
}
