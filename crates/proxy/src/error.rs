//! API error type that maps [`GateError`] variants to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tenantgate_types::GateError;

/// Wrapper around [`GateError`] that implements [`IntoResponse`].
///
/// The body is always `{ "message": ..., "type": ... }`.
#[derive(Debug)]
pub struct ApiError(pub GateError);

impl ApiError {
    /// Returns `(status, error_type)` for the wrapped error.
    fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            GateError::Configuration(_) => (StatusCode::UNAUTHORIZED, "configuration_error"),
            GateError::Authentication { status, .. } => (
                status.map_or(StatusCode::UNAUTHORIZED, vendor_status),
                "authentication_error",
            ),
            GateError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            GateError::Upstream { status, .. } => (vendor_status(*status), "upstream_error"),
            GateError::Network(_) => (StatusCode::BAD_GATEWAY, "network_error"),
            GateError::LocalRequest(_) | GateError::Parse(_) | GateError::Serialization(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error")
            }
        }
    }
}

/// The vendor's status, or 502 when it is not a valid error status.
pub(crate) fn vendor_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, %status, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }
        (
            status,
            Json(json!({
                "message": self.0.to_string(),
                "type": error_type,
            })),
        )
            .into_response()
    }
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        Self(e)
    }
}
