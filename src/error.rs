// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::enclave::EnclaveError;

/// Error answered by the HTTP surfaces (REST gateway and IPC HTTP API).
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// gRPC status code the error corresponds to.
    pub code: tonic::Code,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: i32,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: grpc_code_for(status),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

/// HTTP status for a gRPC code, following the usual gateway mapping.
pub fn http_status_for(code: tonic::Code) -> StatusCode {
    use tonic::Code;
    match code {
        Code::Ok => StatusCode::OK,
        Code::InvalidArgument | Code::OutOfRange | Code::FailedPrecondition => {
            StatusCode::BAD_REQUEST
        }
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Cancelled => StatusCode::REQUEST_TIMEOUT,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unknown | Code::Internal | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn grpc_code_for(status: StatusCode) -> tonic::Code {
    use tonic::Code;
    match status {
        StatusCode::BAD_REQUEST => Code::InvalidArgument,
        StatusCode::UNAUTHORIZED => Code::Unauthenticated,
        StatusCode::FORBIDDEN => Code::PermissionDenied,
        StatusCode::NOT_FOUND => Code::NotFound,
        StatusCode::GATEWAY_TIMEOUT => Code::DeadlineExceeded,
        StatusCode::SERVICE_UNAVAILABLE => Code::Unavailable,
        s if s.is_success() => Code::Ok,
        _ => Code::Internal,
    }
}

impl From<tonic::Status> for ApiError {
    fn from(status: tonic::Status) -> Self {
        Self {
            status: http_status_for(status.code()),
            message: status.message().to_string(),
            code: status.code(),
        }
    }
}

impl From<EnclaveError> for ApiError {
    fn from(err: EnclaveError) -> Self {
        tonic::Status::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            code: self.code as i32,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_code() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.code, tonic::Code::NotFound);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.code, tonic::Code::InvalidArgument);

        let down = ApiError::unavailable("down");
        assert_eq!(down.code, tonic::Code::Unavailable);

        let internal = ApiError::internal("oops");
        assert_eq!(internal.code, tonic::Code::Internal);
    }

    #[test]
    fn grpc_status_maps_to_http() {
        let err: ApiError = tonic::Status::permission_denied("no").into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err: ApiError = tonic::Status::deadline_exceeded("slow").into();
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);

        let err: ApiError = tonic::Status::unknown("?").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn enclave_errors_map_to_http() {
        let err: ApiError = EnclaveError::NotFound.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn json_rejection_becomes_bad_request() {
        use axum::{body::Body, extract::FromRequest, http::Request, Json};

        let request = Request::post("/")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let rejection = Json::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err();

        let err = ApiError::from(rejection);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data","code":3}"#);
    }
}
