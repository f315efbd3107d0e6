//! Authenticated forwarding of caller-described vendor calls.
//!
//! One descriptor becomes exactly one HTTP request. Setup problems (no base
//! URL, no auth header) are returned as `Err`; everything after that is a
//! [`ProxyResult`] value, so callers never have to handle a transport error.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rquest::{
    Method,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
    multipart::{Form, Part},
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tenantgate_config::ProxyConfig;
use tenantgate_types::{
    CredentialStore, GateError, HttpMethod, ProxyResult, RequestConfig, RequestDescriptor, Upload,
    is_defined, traits::Result,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Request body variants the proxy can send.
enum Payload {
    Empty,
    Json(Vec<u8>),
    Form(String),
    Multipart(Form),
}

/// Forwards [`RequestDescriptor`]s to the vendor with the session's
/// `Authorization` header injected.
#[derive(Clone)]
pub struct AuthenticatedProxy {
    http: rquest::Client,
    policy: ProxyConfig,
}

impl AuthenticatedProxy {
    #[must_use]
    pub fn new(http: rquest::Client, policy: ProxyConfig) -> Self {
        Self { http, policy }
    }

    /// Execute `descriptor` with an explicit auth header and config.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] when `config.base_url` or
    /// `auth_header` is blank. Every other failure is reported in the
    /// returned [`ProxyResult`].
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        auth_header: &str,
        config: &RequestConfig,
    ) -> Result<ProxyResult> {
        if !is_defined(&config.base_url) {
            return Err(GateError::Configuration(
                "request config has no base URL".into(),
            ));
        }
        if !is_defined(auth_header) {
            return Err(GateError::Configuration(
                "no Authorization header available".into(),
            ));
        }

        let prepared = match self.prepare(descriptor, auth_header, config) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(url = %descriptor.url, error = %e, "rejecting malformed request");
                return Ok(ProxyResult::local(e.to_string()));
            }
        };
        let (url, headers, payload) = prepared;

        tracing::debug!(method = %descriptor.method, %url, "forwarding request");
        let method = match descriptor.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        };
        let mut builder = self.http.request(method, url.as_str()).headers(headers);
        builder = match payload {
            Payload::Empty => builder,
            Payload::Json(bytes) => builder.body(bytes),
            Payload::Form(body) => builder.body(body),
            Payload::Multipart(form) => builder.multipart(form),
        };

        let resp = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%url, error = %e, "no response from vendor");
                return Ok(ProxyResult::network(e.to_string()));
            }
        };

        let status = resp.status().as_u16();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(%url, status, error = %e, "vendor response body unreadable");
                return Ok(ProxyResult::network(format!(
                    "failed to read response body: {e}"
                )));
            }
        };

        if !(200..300).contains(&status) {
            tracing::warn!(%url, status, "vendor rejected request");
            return Ok(ProxyResult::upstream(status, text));
        }
        Ok(ProxyResult::Success {
            status,
            data: decode_body(text),
        })
    }

    /// Execute `descriptor` using whatever the store currently holds.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::NotAuthenticated`] before any network activity
    /// when the store lacks credentials or config.
    pub async fn execute_session(
        &self,
        descriptor: &RequestDescriptor,
        store: &dyn CredentialStore,
    ) -> Result<ProxyResult> {
        if !store.is_authenticated() {
            return Err(GateError::NotAuthenticated);
        }
        let auth = store.auth_header()?;
        let config = store.request_config().ok_or(GateError::NotAuthenticated)?;
        self.execute(descriptor, &auth, &config).await
    }

    fn prepare(
        &self,
        descriptor: &RequestDescriptor,
        auth_header: &str,
        config: &RequestConfig,
    ) -> Result<(String, HeaderMap, Payload)> {
        let resolved = config.resolve(&descriptor.url)?;
        let url = rquest::Url::parse(&resolved)
            .map_err(|e| GateError::LocalRequest(format!("invalid url {resolved}: {e}")))?;
        let base = rquest::Url::parse(config.base_url.trim())
            .map_err(|e| GateError::LocalRequest(format!("invalid base url: {e}")))?;

        // The path tested is the path sent.
        let path = relative_path(&base, &url).ok_or_else(|| {
            GateError::LocalRequest(format!("url {url} is outside the configured base url"))
        })?;
        if !self.policy.allows(path) {
            return Err(GateError::LocalRequest(format!(
                "path {path} is not in proxy.allowed_paths"
            )));
        }

        let merged = merge_headers(&config.headers, &descriptor.headers, auth_header);
        let payload = build_payload(descriptor, &merged)?;
        let mut headers = to_header_map(&merged)?;
        match &payload {
            Payload::Json(_) if !headers.contains_key(CONTENT_TYPE) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            }
            Payload::Multipart(_) => {
                // The multipart builder supplies its own boundary.
                headers.remove(CONTENT_TYPE);
            }
            _ => {}
        }
        Ok((url.into(), headers, payload))
    }
}

/// Path of `url` below `base`, or `None` when it leaves the base origin or
/// path.
fn relative_path<'a>(base: &rquest::Url, url: &'a rquest::Url) -> Option<&'a str> {
    if url.origin() != base.origin() {
        return None;
    }
    let rest = url.path().strip_prefix(base.path().trim_end_matches('/'))?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Config headers, then descriptor headers, then `Authorization`. Later
/// entries win, compared case-insensitively.
fn merge_headers(
    config: &BTreeMap<String, String>,
    descriptor: &BTreeMap<String, String>,
    auth_header: &str,
) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for (name, value) in config.iter().chain(descriptor) {
        merged.insert(name.to_ascii_lowercase(), value.clone());
    }
    merged.insert("authorization".to_string(), auth_header.to_string());
    merged
}

fn to_header_map(merged: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(merged.len());
    for (name, value) in merged {
        let n = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| GateError::LocalRequest(format!("invalid header name {name:?}: {e}")))?;
        let v = HeaderValue::from_str(value)
            .map_err(|e| GateError::LocalRequest(format!("invalid value for header {name}: {e}")))?;
        map.insert(n, v);
    }
    Ok(map)
}

fn build_payload(
    descriptor: &RequestDescriptor,
    merged: &BTreeMap<String, String>,
) -> Result<Payload> {
    match descriptor.method {
        HttpMethod::Get => Ok(Payload::Empty),
        HttpMethod::Post => {
            if let Some(query) = &descriptor.query {
                return json_payload(&json!({ "query": query }));
            }
            let Some(body) = &descriptor.body else {
                return Ok(Payload::Empty);
            };
            let is_form = merged
                .get("content-type")
                .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
            if is_form {
                form_payload(body)
            } else {
                json_payload(body)
            }
        }
        HttpMethod::Put => match (&descriptor.data, &descriptor.body) {
            (Some(upload), _) => multipart_payload(upload),
            (None, Some(body)) => json_payload(body),
            (None, None) => Ok(Payload::Empty),
        },
    }
}

fn json_payload(body: &Value) -> Result<Payload> {
    Ok(Payload::Json(serde_json::to_vec(body)?))
}

fn form_payload(body: &Value) -> Result<Payload> {
    let Value::Object(map) = body else {
        return Err(GateError::LocalRequest(
            "form body must be a JSON object".into(),
        ));
    };
    let pairs: Vec<(&str, String)> = map
        .iter()
        .map(|(k, v)| (k.as_str(), scalar_text(v)))
        .collect();
    serde_urlencoded::to_string(&pairs)
        .map(Payload::Form)
        .map_err(|e| GateError::LocalRequest(format!("cannot encode form body: {e}")))
}

fn multipart_payload(upload: &Upload) -> Result<Payload> {
    let mut form = Form::new();
    for (name, value) in &upload.fields {
        form = form.text(name.clone(), value.clone());
    }
    for file in &upload.files {
        let bytes = STANDARD.decode(file.content.trim()).map_err(|e| {
            GateError::LocalRequest(format!("file {} is not valid base64: {e}", file.file_name))
        })?;
        let mut part = Part::bytes(bytes).file_name(file.file_name.clone());
        if let Some(ct) = &file.content_type {
            part = part.mime_str(ct).map_err(|e| {
                GateError::LocalRequest(format!("invalid content type {ct:?}: {e}"))
            })?;
        }
        form = form.part(file.field.clone(), part);
    }
    Ok(Payload::Multipart(form))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// JSON when the body parses as JSON, otherwise the raw text (CSV).
fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
