//! Token, credential and connection-config representations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{GateError, error::Result, is_defined};

/// Header carrying the tenant API key on every vendor call.
pub const API_KEY_HEADER: &str = "apikey";

/// Token type assumed when the token endpoint omits `token_type`.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Raw token endpoint payload.
///
/// Fields the gateway does not interpret are kept in `extra` so the payload can
/// be handed back to callers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenPayload {
    /// Create a payload with the given access token and `Bearer` type.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: Some(DEFAULT_TOKEN_TYPE.to_string()),
            expires_in: None,
            scope: None,
            extra: Map::new(),
        }
    }

    /// Parse the token endpoint JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Authentication`] if `access_token` is missing or blank.
    pub fn from_json(json: &Value) -> Result<Self> {
        let payload: Self = serde_json::from_value(json.clone())
            .map_err(|e| GateError::auth(format!("malformed token response: {e}")))?;
        if !is_defined(&payload.access_token) {
            return Err(GateError::auth("missing access_token in token response"));
        }
        Ok(payload)
    }
}

/// The bearer credential for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token_type: String,
    pub access_token: String,
}

impl Credentials {
    pub fn new(token_type: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            token_type: token_type.into(),
            access_token: access_token.into(),
        }
    }

    /// Build credentials from a token payload, defaulting the type to `Bearer`.
    #[must_use]
    pub fn from_payload(payload: &TokenPayload) -> Self {
        let token_type = payload
            .token_type
            .as_deref()
            .filter(|t| is_defined(t))
            .unwrap_or(DEFAULT_TOKEN_TYPE);
        Self::new(token_type, payload.access_token.clone())
    }

    /// Format the `Authorization` header value: `"{token_type} {access_token}"`.
    #[must_use]
    pub fn auth_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !is_defined(&self.access_token) || !is_defined(&self.token_type)
    }
}

/// Base connection parameters issued alongside credentials.
///
/// Serialized as `{ "baseURL": ..., "headers": {...} }`, the shape `/execute`
/// callers send back with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    #[serde(rename = "baseURL", default)]
    pub base_url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl RequestConfig {
    /// Config for a tenant: base URL is the host, headers carry the API key.
    pub fn for_tenant(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(API_KEY_HEADER.to_string(), api_key.into());
        Self {
            base_url: host.into(),
            headers,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !is_defined(&self.base_url)
    }

    /// Resolve a descriptor URL against the base URL.
    ///
    /// Relative paths are joined to `base_url`. Absolute URLs are accepted only
    /// when they point under `base_url`; anything else is rejected so the proxy
    /// cannot be steered at arbitrary hosts.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LocalRequest`] for an empty path or a foreign host.
    pub fn resolve(&self, url: &str) -> Result<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(GateError::LocalRequest("request url is empty".into()));
        }
        let base = self.base_url.trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            if url == base || url.starts_with(&format!("{base}/")) {
                return Ok(url.to_string());
            }
            return Err(GateError::LocalRequest(format!(
                "absolute url {url} is outside the configured base url"
            )));
        }
        Ok(format!("{base}/{}", url.trim_start_matches('/')))
    }
}

/// Result of a successful grant exchange: the raw token plus the connection
/// config for subsequent calls.
///
/// Serialized as `{ "config": ..., "jwt": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub config: RequestConfig,
    #[serde(rename = "jwt")]
    pub payload: TokenPayload,
}

impl TokenGrant {
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::from_payload(&self.payload)
    }
}

/// Tenant-level OAuth client settings needed for every grant.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCredentials {
    pub host: String,
    pub api_key: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for TenantCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantCredentials")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("api_key", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl TenantCredentials {
    /// Ensure every field is non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] listing every missing field.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("host", &self.host),
            ("api_key", &self.api_key),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ]
        .into_iter()
        .filter(|(_, v)| !is_defined(v))
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GateError::Configuration(format!(
                "missing OAuth 2.0 tenant settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// The host with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.host.trim_end_matches('/')
    }

    #[must_use]
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig::for_tenant(self.base_url(), self.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tenant() -> TenantCredentials {
        TenantCredentials {
            host: "https://acme.example.com/".into(),
            api_key: "key".into(),
            client_id: "cid".into(),
            client_secret: "secret".into(),
        }
    }

    #[test]
    fn test_payload_from_json_keeps_extra_fields() {
        let resp = json!({
            "access_token": "at123",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "read",
            "tenant_code": "WFF_j1r"
        });
        let payload = TokenPayload::from_json(&resp).unwrap();
        assert_eq!(payload.access_token, "at123");
        assert_eq!(payload.expires_in, Some(3600));
        assert_eq!(payload.extra["tenant_code"], "WFF_j1r");
        assert_eq!(serde_json::to_value(&payload).unwrap(), resp);
    }

    #[test]
    fn test_payload_missing_access_token() {
        let err = TokenPayload::from_json(&json!({"token_type": "Bearer"})).unwrap_err();
        assert!(matches!(err, GateError::Authentication { status: None, .. }));
    }

    #[test]
    fn test_payload_blank_access_token() {
        assert!(TokenPayload::from_json(&json!({"access_token": "  "})).is_err());
    }

    #[test]
    fn test_auth_header_format() {
        let creds = Credentials::new("Bearer", "tok");
        assert_eq!(creds.auth_header(), "Bearer tok");
    }

    #[test]
    fn test_credentials_default_token_type() {
        let mut payload = TokenPayload::bearer("tok");
        payload.token_type = None;
        assert_eq!(Credentials::from_payload(&payload).auth_header(), "Bearer tok");
        payload.token_type = Some(String::new());
        assert_eq!(Credentials::from_payload(&payload).token_type, "Bearer");
    }

    #[test]
    fn test_request_config_wire_shape() {
        let config = RequestConfig::for_tenant("https://acme.example.com", "key");
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({"baseURL": "https://acme.example.com", "headers": {"apikey": "key"}})
        );
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = RequestConfig::for_tenant("https://acme.example.com/", "key");
        assert_eq!(
            config
                .resolve("/v1/data/model/analytic-objects/Employee")
                .unwrap(),
            "https://acme.example.com/v1/data/model/analytic-objects/Employee"
        );
        assert_eq!(
            config.resolve("v1/data/query/sql").unwrap(),
            "https://acme.example.com/v1/data/query/sql"
        );
    }

    #[test]
    fn test_resolve_absolute_same_host() {
        let config = RequestConfig::for_tenant("https://acme.example.com", "key");
        assert_eq!(
            config
                .resolve("https://acme.example.com/v1/admin/tenants")
                .unwrap(),
            "https://acme.example.com/v1/admin/tenants"
        );
    }

    #[test]
    fn test_resolve_rejects_foreign_host() {
        let config = RequestConfig::for_tenant("https://acme.example.com", "key");
        let err = config.resolve("https://evil.example.net/v1").unwrap_err();
        assert!(matches!(err, GateError::LocalRequest(_)));
        assert!(config.resolve("https://acme.example.com.evil.net/x").is_err());
        assert!(config.resolve("  ").is_err());
    }

    #[test]
    fn test_token_grant_wire_shape() {
        let grant = TokenGrant {
            config: RequestConfig::for_tenant("https://h", "k"),
            payload: TokenPayload::bearer("tok"),
        };
        let v = serde_json::to_value(&grant).unwrap();
        assert_eq!(v["jwt"]["access_token"], "tok");
        assert_eq!(v["config"]["baseURL"], "https://h");
        assert_eq!(grant.credentials().auth_header(), "Bearer tok");
    }

    #[test]
    fn test_tenant_validate_ok() {
        assert!(tenant().validate().is_ok());
    }

    #[test]
    fn test_tenant_validate_lists_blank_fields() {
        let mut t = tenant();
        t.client_secret = " ".into();
        t.api_key = String::new();
        let err = t.validate().unwrap_err().to_string();
        assert!(err.contains("client_secret"));
        assert!(err.contains("api_key"));
        assert!(!err.contains("client_id"));
    }

    #[test]
    fn test_tenant_debug_redacts_secrets() {
        let s = format!("{:?}", tenant());
        assert!(!s.contains("secret\""));
        assert!(s.contains("<redacted>"));
    }

    #[test]
    fn test_tenant_request_config() {
        let config = tenant().request_config();
        assert_eq!(config.base_url, "https://acme.example.com");
        assert_eq!(config.headers.get(API_KEY_HEADER).map(String::as_str), Some("key"));
    }
}
