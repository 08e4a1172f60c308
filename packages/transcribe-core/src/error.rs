//! Centralized error types for the transcribe gateway core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the transcribe gateway.
///
/// Most variants never reach a client directly: per the session pipeline's error
/// handling policy, only `ConfigMissing` and `UpstreamProtocolError` are surfaced
/// to the downstream client, as the `error` field of the terminal `is_final` message.
/// The rest are absorbed into graceful degradation and logged.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum TranscribeError {
    /// Upstream ASR credentials are absent or incomplete.
    #[error("volcengine credentials not configured: {0}")]
    ConfigMissing(String),

    /// The upstream ASR connection sent a protocol-level error frame.
    #[error("upstream ASR error: code={0}")]
    UpstreamProtocolError(u32),

    /// A WebSocket transport error on either the downstream or upstream socket.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The LLM rewrite call failed. Never fatal: callers fall back to the raw snapshot.
    #[error("LLM rewrite failed: {0}")]
    LLMError(String),
}

impl ErrorCode for TranscribeError {
    fn code(&self) -> &'static str {
        match self {
            Self::ConfigMissing(_) => "config_missing",
            Self::UpstreamProtocolError(_) => "upstream_protocol_error",
            Self::TransportError(_) => "transport_error",
            Self::LLMError(_) => "llm_error",
        }
    }
}

impl TranscribeError {
    /// Maps the error to an appropriate HTTP status code.
    ///
    /// Used only for the rare case this error escapes to a plain HTTP surface
    /// (e.g. a startup config-validation failure); the WS session path reports
    /// errors as JSON message payloads, not HTTP statuses.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConfigMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamProtocolError(_) | Self::TransportError(_) => StatusCode::BAD_GATEWAY,
            Self::LLMError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type TranscribeResult<T> = Result<T, TranscribeError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for TranscribeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_missing_returns_correct_code() {
        let err = TranscribeError::ConfigMissing("missing app_key".into());
        assert_eq!(err.code(), "config_missing");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_protocol_error_returns_correct_code() {
        let err = TranscribeError::UpstreamProtocolError(1234);
        assert_eq!(err.code(), "upstream_protocol_error");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn llm_error_is_internal() {
        let err = TranscribeError::LLMError("timeout".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
