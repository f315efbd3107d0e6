//! Token endpoint exchange for all supported grants.
//!
//! Every grant goes through a single form-encoded `POST` to
//! `{host}/v1/auth/oauth2/token`, authenticated with HTTP Basic
//! (`client_id:client_secret`) plus the tenant `apikey` header.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tenantgate_types::{
    GateError, Grant, GrantExchanger, TenantCredentials, TokenGrant, TokenPayload,
    credentials::API_KEY_HEADER, is_defined, traits::Result,
};

/// Token endpoint path, relative to the tenant host.
pub const TOKEN_PATH: &str = "/v1/auth/oauth2/token";

/// Scope requested for every grant.
pub const SCOPE: &str = "read";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Generate the HTTP Basic Auth header value.
///
/// Format: `Basic base64(client_id:client_secret)`.
#[must_use]
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    let cred = format!("{client_id}:{client_secret}");
    format!("Basic {}", STANDARD.encode(cred.as_bytes()))
}

/// A fully specified token endpoint request, built without any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub form: Vec<(&'static str, String)>,
}

impl TokenRequest {
    /// Build the request for `grant` against `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] if any tenant setting is blank, or
    /// [`GateError::Authentication`] if a grant field (code, username,
    /// password, assertion) is blank.
    pub fn build(tenant: &TenantCredentials, grant: &Grant) -> Result<Self> {
        tenant.validate()?;

        let fields = grant.form_fields();
        if let Some((name, _)) = fields.iter().find(|(_, v)| !is_defined(v)) {
            return Err(GateError::auth(format!(
                "missing {name} for {} grant",
                grant.kind()
            )));
        }

        let mut form = vec![
            ("grant_type", grant.grant_type().to_string()),
            ("client_id", tenant.client_id.clone()),
            ("scope", SCOPE.to_string()),
        ];
        form.extend(fields.into_iter().map(|(k, v)| (k, v.to_string())));

        Ok(Self {
            url: format!("{}{TOKEN_PATH}", tenant.base_url()),
            headers: vec![
                (
                    "Authorization",
                    basic_auth_header(&tenant.client_id, &tenant.client_secret),
                ),
                (API_KEY_HEADER, tenant.api_key.clone()),
                ("Content-Type", FORM_CONTENT_TYPE.to_string()),
            ],
            form,
        })
    }

    /// The form-encoded request body.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LocalRequest`] if the form cannot be encoded.
    pub fn form_body(&self) -> Result<String> {
        serde_urlencoded::to_string(&self.form)
            .map_err(|e| GateError::LocalRequest(format!("cannot encode token form: {e}")))
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Performs grant exchanges for one tenant.
pub struct TokenExchanger {
    http: rquest::Client,
    tenant: TenantCredentials,
}

impl TokenExchanger {
    #[must_use]
    pub fn new(http: rquest::Client, tenant: TenantCredentials) -> Self {
        Self { http, tenant }
    }

    #[must_use]
    pub fn tenant(&self) -> &TenantCredentials {
        &self.tenant
    }
}

#[async_trait]
impl GrantExchanger for TokenExchanger {
    async fn exchange(&self, grant: &Grant) -> Result<TokenGrant> {
        let request = TokenRequest::build(&self.tenant, grant)?;
        let body = request.form_body()?;

        tracing::info!(
            grant_type = %grant.kind(),
            host = %self.tenant.base_url(),
            "exchanging grant for token"
        );

        let mut builder = self.http.post(&request.url).body(body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let resp = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, "token endpoint unreachable");
            GateError::auth(format!("token endpoint unreachable: {e}"))
        })?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| GateError::Authentication {
            status: Some(status),
            body: format!("failed to read token response: {e}"),
        })?;

        if !(200..300).contains(&status) {
            tracing::warn!(status, "token endpoint rejected grant");
            return Err(GateError::Authentication {
                status: Some(status),
                body: text,
            });
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| GateError::Authentication {
                status: Some(status),
                body: format!("token response is not JSON: {e}"),
            })?;
        let payload = TokenPayload::from_json(&json)?;

        tracing::debug!(token_type = ?payload.token_type, "token issued");
        Ok(TokenGrant {
            config: self.tenant.request_config(),
            payload,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::{Value, json};
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    /// One request observed by the mock token endpoint.
    #[derive(Debug, Clone)]
    pub(crate) struct Captured {
        pub headers: HeaderMap,
        pub form: Vec<(String, String)>,
    }

    impl Captured {
        pub fn field(&self, name: &str) -> Option<&str> {
            self.form
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Spawn a token endpoint answering every call with `status` + `body`.
    pub(crate) async fn spawn_token_endpoint(
        status: StatusCode,
        body: Value,
    ) -> (String, Arc<Mutex<Vec<Captured>>>) {
        let seen: Arc<Mutex<Vec<Captured>>> = Arc::default();
        let recorder = Arc::clone(&seen);
        let app = Router::new().route(
            TOKEN_PATH,
            post(move |headers: HeaderMap, raw: String| {
                let recorder = Arc::clone(&recorder);
                let body = body.clone();
                async move {
                    let form: Vec<(String, String)> =
                        serde_urlencoded::from_str(&raw).unwrap_or_default();
                    recorder.lock().unwrap().push(Captured { headers, form });
                    (status, Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    pub(crate) fn tenant(host: &str) -> TenantCredentials {
        TenantCredentials {
            host: host.to_string(),
            api_key: "api-key-1".into(),
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
        }
    }

    fn all_grants() -> Vec<Grant> {
        vec![
            Grant::AuthorizationCode {
                code: "abc123".into(),
            },
            Grant::Password {
                username: "alice".into(),
                password: "hunter2".into(),
            },
            Grant::Saml2Bearer {
                assertion: "PHNhbWxwOlJlc3BvbnNlPg==".into(),
            },
        ]
    }

    #[test]
    fn test_basic_auth_header() {
        let h = basic_auth_header("client-1", "secret-1");
        let encoded = h.strip_prefix("Basic ").unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "client-1:secret-1");
    }

    #[test]
    fn test_build_form_fields_exact_per_grant() {
        let t = tenant("https://acme.example.com/");
        for grant in all_grants() {
            let req = TokenRequest::build(&t, &grant).unwrap();
            let map: HashMap<_, _> = req.form.iter().cloned().collect();

            let mut expected: Vec<&str> = vec!["grant_type", "client_id", "scope"];
            expected.extend(grant.form_fields().iter().map(|(k, _)| *k));
            let mut keys: Vec<&str> = req.form.iter().map(|(k, _)| *k).collect();
            keys.sort_unstable();
            expected.sort_unstable();
            assert_eq!(keys, expected, "unexpected fields for {grant:?}");

            assert_eq!(map["grant_type"], grant.grant_type());
            assert_eq!(map["client_id"], "client-1");
            assert_eq!(map["scope"], "read");
            for (k, v) in grant.form_fields() {
                assert_eq!(map[k], v);
            }
        }
    }

    #[test]
    fn test_build_headers_and_url() {
        let t = tenant("https://acme.example.com/");
        let req = TokenRequest::build(&t, &all_grants()[0]).unwrap();
        assert_eq!(req.url, "https://acme.example.com/v1/auth/oauth2/token");
        assert_eq!(
            req.header("authorization"),
            Some(basic_auth_header("client-1", "secret-1").as_str())
        );
        assert_eq!(req.header("apikey"), Some("api-key-1"));
        assert_eq!(
            req.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_form_body_encoding() {
        let t = tenant("https://h");
        let req = TokenRequest::build(
            &t,
            &Grant::AuthorizationCode {
                code: "abc123".into(),
            },
        )
        .unwrap();
        assert_eq!(
            req.form_body().unwrap(),
            "grant_type=authorization_code&client_id=client-1&scope=read&code=abc123"
        );
    }

    #[test]
    fn test_build_rejects_blank_tenant_fields() {
        let mut t = tenant("https://h");
        t.client_secret = "  ".into();
        let err = TokenRequest::build(&t, &all_grants()[1]).unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[test]
    fn test_build_rejects_blank_grant_fields() {
        let t = tenant("https://h");
        let err = TokenRequest::build(&t, &Grant::AuthorizationCode { code: String::new() })
            .unwrap_err();
        assert!(matches!(err, GateError::Authentication { status: None, .. }));
        assert!(err.to_string().contains("code"));
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let (host, seen) = spawn_token_endpoint(
            StatusCode::OK,
            json!({"access_token": "tok-1", "token_type": "Bearer", "expires_in": 3600}),
        )
        .await;
        let exchanger = TokenExchanger::new(rquest::Client::new(), tenant(&host));
        let grant = exchanger
            .exchange(&Grant::Password {
                username: "alice".into(),
                password: "hunter2".into(),
            })
            .await
            .unwrap();

        assert_eq!(grant.payload.access_token, "tok-1");
        assert_eq!(grant.config.base_url, host);
        assert_eq!(grant.config.headers["apikey"], "api-key-1");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let call = &seen[0];
        assert_eq!(call.field("grant_type"), Some("password"));
        assert_eq!(call.field("username"), Some("alice"));
        assert_eq!(call.field("scope"), Some("read"));
        assert_eq!(
            call.headers.get("apikey").and_then(|v| v.to_str().ok()),
            Some("api-key-1")
        );
        assert_eq!(
            call.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok()),
            Some(basic_auth_header("client-1", "secret-1").as_str())
        );
    }

    #[tokio::test]
    async fn test_exchange_rejected_carries_status_and_body() {
        let (host, seen) =
            spawn_token_endpoint(StatusCode::UNAUTHORIZED, json!({"error": "invalid_client"}))
                .await;
        let exchanger = TokenExchanger::new(rquest::Client::new(), tenant(&host));
        let err = exchanger
            .exchange(&Grant::AuthorizationCode {
                code: "abc123".into(),
            })
            .await
            .unwrap_err();

        match err {
            GateError::Authentication { status, body } => {
                assert_eq!(status, Some(401));
                assert!(body.contains("invalid_client"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // No retry.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exchange_missing_access_token() {
        let (host, _) = spawn_token_endpoint(StatusCode::OK, json!({"token_type": "Bearer"})).await;
        let exchanger = TokenExchanger::new(rquest::Client::new(), tenant(&host));
        let err = exchanger
            .exchange(&Grant::Saml2Bearer {
                assertion: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Authentication { .. }));
    }

    #[tokio::test]
    async fn test_exchange_unreachable_host() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let exchanger =
            TokenExchanger::new(rquest::Client::new(), tenant(&format!("http://{addr}")));
        let err = exchanger
            .exchange(&Grant::AuthorizationCode { code: "c".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Authentication { status: None, .. }));
    }

    #[tokio::test]
    async fn test_exchange_config_error_makes_no_call() {
        let (host, seen) = spawn_token_endpoint(StatusCode::OK, json!({})).await;
        let mut t = tenant(&host);
        t.api_key = String::new();
        let exchanger = TokenExchanger::new(rquest::Client::new(), t);
        let err = exchanger
            .exchange(&Grant::AuthorizationCode { code: "c".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
        assert!(seen.lock().unwrap().is_empty());
    }
}
