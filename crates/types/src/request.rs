//! Request descriptors forwarded by the authenticated proxy, and the uniform
//! result shape returned for them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt};

/// HTTP methods the proxy forwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        })
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// A file part of a multipart upload. `content` is base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    #[serde(default = "default_file_field")]
    pub field: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub content: String,
}

fn default_file_field() -> String {
    "files".to_string()
}

/// Multipart body for `PUT` uploads (direct data loads).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<UploadFile>,
}

/// Caller-constructed description of a single vendor API call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    /// JSON (or form, per `Content-Type`) body for `POST`/`PUT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// SQL-like query text; sent as `{"query": ...}` on `POST`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Multipart upload for `PUT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Upload>,
    /// Per-request headers, layered over the config headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body),
            ..Self::default()
        }
    }

    /// A `POST` carrying `{"query": query}`.
    pub fn post_query(url: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn put_upload(url: impl Into<String>, upload: Upload) -> Self {
        Self {
            method: HttpMethod::Put,
            url: url.into(),
            data: Some(upload),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Why a proxied call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No response was received.
    Network,
    /// The vendor answered with a non-success status.
    Upstream,
    /// The descriptor could not be turned into a request.
    Local,
}

/// Uniform failure envelope: `{ "error": message, "kind": ..., "status"?: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyFailure {
    pub kind: FailureKind,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Outcome of one proxied call. Failures are values, never panics or `Err`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyResult {
    Success { status: u16, data: Value },
    Failure(ProxyFailure),
}

impl ProxyResult {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Failure(ProxyFailure {
            kind: FailureKind::Network,
            message: message.into(),
            status: None,
            body: None,
        })
    }

    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::Failure(ProxyFailure {
            kind: FailureKind::Upstream,
            message: format!("upstream returned status {status}"),
            status: Some(status),
            body: Some(body),
        })
    }

    pub fn local(message: impl Into<String>) -> Self {
        Self::Failure(ProxyFailure {
            kind: FailureKind::Local,
            message: message.into(),
            status: None,
            body: None,
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
