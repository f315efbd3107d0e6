//! Interactive login dispatcher for the CLI.

use tenantgate_config::Config;
use tenantgate_types::{GateError, Grant, GrantKind, traits::Result};

use crate::{TokenExchanger, callback, session::SessionContext};

/// Run a complete login for `kind` and leave `session` authenticated.
///
/// `assertion` is the base64 SAML response; it is required for
/// [`GrantKind::Saml2Bearer`] and ignored otherwise.
///
/// # Errors
///
/// Returns an error if tenant settings are incomplete, the callback never
/// arrives, or the token endpoint rejects the grant.
pub async fn login(
    kind: GrantKind,
    config: &Config,
    session: &mut SessionContext,
    http: rquest::Client,
    assertion: Option<String>,
) -> Result<()> {
    let exchanger = TokenExchanger::new(http, config.tenant.credentials());
    match kind {
        GrantKind::AuthorizationCode => login_code(config, session, &exchanger).await?,
        GrantKind::Password => {
            let grant = config.tenant.password_grant()?;
            session.login_with(&exchanger, &grant).await?;
        }
        GrantKind::Saml2Bearer => {
            let assertion = assertion.ok_or_else(|| {
                GateError::Configuration("a SAML assertion is required for saml2-bearer".into())
            })?;
            session
                .login_with(&exchanger, &Grant::Saml2Bearer { assertion })
                .await?;
        }
    }
    eprintln!("Login successful ({kind})");
    Ok(())
}

async fn login_code(
    config: &Config,
    session: &mut SessionContext,
    exchanger: &TokenExchanger,
) -> Result<()> {
    // Secret is needed after the redirect; fail before opening a browser.
    exchanger.tenant().validate()?;
    let listener = callback::bind_callback(config.callback_port).await?;
    let url = session.begin_login(exchanger.tenant())?;
    open_browser(&url);

    let params = callback::accept_callback(listener).await?;
    let code = params
        .get("code")
        .ok_or_else(|| GateError::auth("missing code parameter in callback"))?;
    session.handle_callback(exchanger, code).await?;
    Ok(())
}

fn open_browser(url: &str) {
    eprintln!("Opening browser: {url}");
    if let Err(e) = open::that(url) {
        tracing::debug!(error = %e, "browser launch failed");
        eprintln!("Could not open a browser. Open this URL to continue:");
        eprintln!("{url}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::tests::spawn_token_endpoint;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;
    use tenantgate_config::TenantConfig;
    use tenantgate_store::InMemoryCredentialStore;

    fn config(host: &str) -> Config {
        Config {
            tenant: TenantConfig {
                host: host.to_string(),
                api_key: "key".into(),
                client_id: "cid".into(),
                client_secret: "secret".into(),
                username: "alice".into(),
                password: "pw".into(),
            },
            ..Config::default()
        }
    }

    fn session() -> SessionContext {
        SessionContext::new(Arc::new(InMemoryCredentialStore::new()))
    }

    #[tokio::test]
    async fn test_password_login() {
        let (host, seen) =
            spawn_token_endpoint(StatusCode::OK, json!({"access_token": "tok"})).await;
        let mut s = session();
        login(
            GrantKind::Password,
            &config(&host),
            &mut s,
            rquest::Client::new(),
            None,
        )
        .await
        .unwrap();

        assert!(s.is_authenticated());
        assert_eq!(s.store().auth_header().unwrap(), "Bearer tok");
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].field("username"), Some("alice"));
        assert_eq!(seen[0].field("password"), Some("pw"));
    }

    #[tokio::test]
    async fn test_password_login_requires_username() {
        let mut cfg = config("http://127.0.0.1:9");
        cfg.tenant.username = String::new();
        let err = login(
            GrantKind::Password,
            &cfg,
            &mut session(),
            rquest::Client::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_saml_login() {
        let (host, seen) =
            spawn_token_endpoint(StatusCode::OK, json!({"access_token": "saml-tok"})).await;
        let mut s = session();
        login(
            GrantKind::Saml2Bearer,
            &config(&host),
            &mut s,
            rquest::Client::new(),
            Some("PHNhbWw+".into()),
        )
        .await
        .unwrap();
        assert_eq!(s.store().auth_header().unwrap(), "Bearer saml-tok");
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen[0].field("grant_type"),
            Some("urn:ietf:params:oauth:grant-type:saml2-bearer")
        );
        assert_eq!(seen[0].field("assertion"), Some("PHNhbWw+"));
    }

    #[tokio::test]
    async fn test_saml_login_without_assertion() {
        let err = login(
            GrantKind::Saml2Bearer,
            &config("http://127.0.0.1:9"),
            &mut session(),
            rquest::Client::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_code_login_checks_settings_before_binding() {
        let mut cfg = config("http://127.0.0.1:9");
        cfg.tenant.client_secret = String::new();
        let mut s = session();
        let err = login(
            GrantKind::AuthorizationCode,
            &cfg,
            &mut s,
            rquest::Client::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
        assert_eq!(s.state(), &crate::LoginFlow::Anonymous);
    }
}
