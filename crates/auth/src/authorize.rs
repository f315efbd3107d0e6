//! Authorization endpoint URL for the three-legged code flow.

use tenantgate_types::{GateError, TenantCredentials, is_defined, traits::Result};

/// Authorization endpoint path, relative to the tenant host.
pub const AUTHORIZE_PATH: &str = "/v1/auth/oauth2/authorize";

/// Build the URL the user agent is sent to for consent.
///
/// Only `host`, `client_id` and `api_key` are needed here; the client secret
/// is checked later by the token exchange.
///
/// # Errors
///
/// Returns [`GateError::Configuration`] if any of the three settings is blank.
pub fn build_authorize_url(tenant: &TenantCredentials) -> Result<String> {
    let missing: Vec<&str> = [
        ("host", &tenant.host),
        ("client_id", &tenant.client_id),
        ("api_key", &tenant.api_key),
    ]
    .into_iter()
    .filter(|(_, v)| !is_defined(v))
    .map(|(name, _)| name)
    .collect();
    if !missing.is_empty() {
        return Err(GateError::Configuration(format!(
            "missing OAuth 2.0 tenant settings: {}",
            missing.join(", ")
        )));
    }

    let query = serde_urlencoded::to_string([
        ("client_id", tenant.client_id.as_str()),
        ("response_type", "code"),
        ("apikey", tenant.api_key.as_str()),
    ])
    .map_err(|e| GateError::LocalRequest(format!("cannot encode authorize query: {e}")))?;

    Ok(format!("{}{AUTHORIZE_PATH}?{query}", tenant.base_url()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantCredentials {
        TenantCredentials {
            host: "https://acme.example.com/".into(),
            api_key: "key 1".into(),
            client_id: "cid".into(),
            client_secret: String::new(),
        }
    }

    #[test]
    fn test_authorize_url() {
        let url = build_authorize_url(&tenant()).unwrap();
        assert_eq!(
            url,
            "https://acme.example.com/v1/auth/oauth2/authorize?client_id=cid&response_type=code&apikey=key+1"
        );
    }

    #[test]
    fn test_authorize_url_ignores_secret() {
        // The secret is blank in the fixture; the URL is still produced.
        assert!(build_authorize_url(&tenant()).is_ok());
    }

    #[test]
    fn test_authorize_url_missing_settings() {
        let mut t = tenant();
        t.client_id = " ".into();
        t.host = String::new();
        let err = build_authorize_url(&t).unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
        let msg = err.to_string();
        assert!(msg.contains("host"));
        assert!(msg.contains("client_id"));
        assert!(!msg.contains("api_key"));
    }
}
