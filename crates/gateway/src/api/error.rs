//! HTTP mapping for gate and request errors.
//!
//! Every failure body is `{ "error": <code>, "detail": <message> }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::runtime::GateError;

#[derive(Debug)]
pub enum ApiError {
    Gate(GateError),
    Validation(String),
    Unavailable(String),
    NotFound(String),
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        ApiError::Gate(e)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Gate(e) => match e {
                GateError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", e.to_string()),
                GateError::QuotaExceeded(_) => {
                    (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded", e.to_string())
                }
                GateError::ConversationLimit(_) => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "conversation_limit_exceeded",
                    e.to_string(),
                ),
                GateError::Pipeline(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "pipeline_error", e.to_string())
                }
            },
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "no_llm_provider", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = code, detail = %detail, "request failed");
        }

        let mut body = serde_json::json!({ "error": code, "detail": detail });
        if let ApiError::Gate(GateError::ConversationLimit(limit)) = &self {
            body["kind"] = serde_json::json!(limit.kind);
        }
        (status, Json(body)).into_response()
    }
}
