//! `/execute` and `/session/execute`: forward a descriptor to the vendor.
//!
//! Success passes the vendor status and body through untouched. Failures
//! become `{ "message", "kind", "body"? }` with the vendor status, 502 for
//! network failures, or 400 for malformed descriptors.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tenantgate_types::{
    FailureKind, GateError, ProxyFailure, ProxyResult, RequestConfig, RequestDescriptor,
    is_defined,
};

use crate::{AppState, error::ApiError, error::vendor_status};

/// Stateless call: the caller supplies the auth header and config it got
/// from `/oauth2/token`.
#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    auth: String,
    #[serde(default)]
    config: RequestConfig,
    #[serde(flatten)]
    descriptor: RequestDescriptor,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        ApiError(GateError::LocalRequest(format!(
            "invalid request descriptor: {e}"
        )))
    })
}

/// `POST /execute`
pub async fn execute(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req: ExecuteRequest = parse_body(&body)?;
    check_tenant_base(&req.config, &state.config.load().tenant.host)?;
    let result = state
        .proxy()
        .execute(&req.descriptor, &req.auth, &req.config)
        .await?;
    Ok(proxy_response(result))
}

/// Stateless calls may only target the configured tenant. A blank base is
/// left for the proxy to report.
fn check_tenant_base(config: &RequestConfig, tenant_host: &str) -> Result<(), ApiError> {
    if !is_defined(&config.base_url) {
        return Ok(());
    }
    if !is_defined(tenant_host) {
        return Err(ApiError(GateError::Configuration(
            "tenant.host is not configured".into(),
        )));
    }
    if config.base_url.trim().trim_end_matches('/') != tenant_host.trim().trim_end_matches('/') {
        tracing::warn!(base_url = %config.base_url, "rejecting call outside the tenant host");
        return Err(ApiError(GateError::LocalRequest(format!(
            "baseURL {} is not the configured tenant host",
            config.base_url
        ))));
    }
    Ok(())
}

/// `POST /session/execute`
pub async fn session_execute(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let descriptor: RequestDescriptor = parse_body(&body)?;
    let store = Arc::clone(state.session.lock().await.store());
    let result = state
        .proxy()
        .execute_session(&descriptor, store.as_ref())
        .await?;
    Ok(proxy_response(result))
}

pub(crate) fn proxy_response(result: ProxyResult) -> Response {
    match result {
        ProxyResult::Success { status, data } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            match data {
                Value::Null => status.into_response(),
                Value::String(text) => {
                    (status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response()
                }
                other => (status, Json(other)).into_response(),
            }
        }
        ProxyResult::Failure(failure) => failure_response(failure),
    }
}

fn failure_response(failure: ProxyFailure) -> Response {
    let status = match failure.kind {
        FailureKind::Network => StatusCode::BAD_GATEWAY,
        FailureKind::Local => StatusCode::BAD_REQUEST,
        FailureKind::Upstream => failure.status.map_or(StatusCode::BAD_GATEWAY, vendor_status),
    };
    let mut body = json!({
        "message": failure.message,
        "kind": failure.kind,
    });
    if let Some(raw) = failure.body {
        body["body"] = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
    }
    (status, Json(body)).into_response()
}
