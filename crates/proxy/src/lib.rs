//! HTTP gateway layer: authenticated proxy, axum router, and error mapping.
//!
//! Exposes a stateless `/execute` endpoint for callers that hold their own
//! token, the OAuth routes that issue one, and a gateway-held session for
//! callers that should never see the token at all.

mod error;
mod execute;
pub mod forward;
mod oauth;
pub mod table;

pub use error::ApiError;
pub use forward::AuthenticatedProxy;
pub use oauth::SessionView;
pub use table::QueryTable;

use arc_swap::ArcSwap;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tenantgate_auth::{SessionContext, TokenExchanger};
use tenantgate_config::Config;
use tenantgate_store::InMemoryCredentialStore;
use tenantgate_types::CredentialStore;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

/// Shared application state passed to all route handlers.
pub struct AppState {
    /// Gateway configuration; atomically swappable for hot-reloading.
    pub config: Arc<ArcSwap<Config>>,
    /// HTTP client for token and vendor calls.
    pub http: rquest::Client,
    /// The gateway's own login session. Held across the exchange so a
    /// callback code is checked and exchanged in one critical section.
    pub session: Mutex<SessionContext>,
}

impl AppState {
    /// Creates a new shared application state wrapped in an `Arc`.
    ///
    /// If the config specifies a `proxy_url`, the HTTP client is built with that proxy.
    pub fn new(config: Arc<ArcSwap<Config>>, store: Arc<dyn CredentialStore>) -> Arc<Self> {
        let http = build_http_client(config.load().proxy_url.as_deref());
        Arc::new(Self {
            config,
            http,
            session: Mutex::new(SessionContext::new(store)),
        })
    }

    /// State backed by a fresh [`InMemoryCredentialStore`].
    pub fn in_memory(config: Arc<ArcSwap<Config>>) -> Arc<Self> {
        Self::new(config, Arc::new(InMemoryCredentialStore::new()))
    }

    /// An exchanger for the tenant in the current config snapshot.
    #[must_use]
    pub fn exchanger(&self) -> TokenExchanger {
        TokenExchanger::new(self.http.clone(), self.config.load().tenant.credentials())
    }

    /// A proxy carrying the current allow-list.
    #[must_use]
    pub fn proxy(&self) -> AuthenticatedProxy {
        AuthenticatedProxy::new(self.http.clone(), self.config.load().proxy.clone())
    }
}

/// Build an HTTP client, optionally configured with a proxy URL.
#[must_use]
pub fn build_http_client(proxy_url: Option<&str>) -> rquest::Client {
    if let Some(url) = proxy_url {
        match rquest::Proxy::all(url) {
            Ok(proxy) => match rquest::Client::builder().proxy(proxy).build() {
                Ok(client) => return client,
                Err(e) => {
                    tracing::warn!(url = url, error = %e, "cannot build proxied client, using direct connection");
                }
            },
            Err(e) => {
                tracing::warn!(url = url, error = %e, "invalid proxy_url, using direct connection");
            }
        }
    }
    rquest::Client::new()
}

/// Build the full axum router.
///
/// Routes:
/// - GET  /oauth2/authorize          authorize URL for the code flow
/// - GET  /oauth2/token?code=        stateless code exchange
/// - GET  /oauth2/callback?code=     code exchange into the gateway session
/// - POST /oauth2/saml               SAML assertion exchange (form `SAMLResponse`)
/// - POST /oauth2/password           password grant from configured credentials
/// - POST /execute                   stateless proxy call
/// - GET  /session                   session state
/// - GET  /session/login             start the code flow for the gateway session
/// - POST /session/execute           proxy call with the session's token
/// - POST /logout
/// - GET  /health
pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/oauth2/authorize", get(oauth::authorize))
        .route("/oauth2/token", get(oauth::token))
        .route("/oauth2/callback", get(oauth::callback))
        .route("/oauth2/saml", post(oauth::saml))
        .route("/oauth2/password", post(oauth::password))
        .route("/execute", post(execute::execute))
        .route("/session", get(oauth::session))
        .route("/session/login", get(oauth::session_login))
        .route("/session/execute", post(execute::session_execute))
        .route("/logout", post(oauth::logout))
        .route("/health", get(oauth::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
