//! OAuth 2.0 and session routes.
//!
//! `/oauth2/authorize` and `/oauth2/token` are stateless: the caller keeps
//! the returned token. The remaining routes drive the gateway's own
//! [`SessionContext`], which `/session/execute` then uses.

use axum::{
    Form, Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tenantgate_auth::{LoginFlow, SessionContext, authorize::build_authorize_url};
use tenantgate_types::{Grant, GrantExchanger as _, TokenGrant};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
pub struct SamlForm {
    #[serde(rename = "SAMLResponse", default)]
    saml_response: String,
}

/// Public view of the gateway session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub authenticated: bool,
    #[serde(flatten)]
    pub flow: LoginFlow,
}

impl SessionView {
    fn of(session: &SessionContext) -> Self {
        Self {
            authenticated: session.is_authenticated(),
            flow: session.state().clone(),
        }
    }
}

/// `GET /oauth2/authorize`
pub async fn authorize(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let tenant = state.config.load().tenant.credentials();
    let url = build_authorize_url(&tenant)?;
    Ok(Json(json!({ "url": url })))
}

/// `GET /oauth2/token?code=`
pub async fn token(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CodeQuery>,
) -> Result<Json<TokenGrant>, ApiError> {
    let grant = Grant::AuthorizationCode { code: q.code };
    let token = state.exchanger().exchange(&grant).await?;
    Ok(Json(token))
}

/// `GET /oauth2/callback?code=`
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CodeQuery>,
) -> Result<Json<SessionView>, ApiError> {
    let exchanger = state.exchanger();
    let mut session = state.session.lock().await;
    let outcome = session.handle_callback(&exchanger, &q.code).await?;
    tracing::debug!(?outcome, "callback handled");
    Ok(Json(SessionView::of(&session)))
}

/// `GET /session/login`: start the code flow for the gateway session.
pub async fn session_login(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let tenant = state.config.load().tenant.credentials();
    let mut session = state.session.lock().await;
    let url = session.begin_login(&tenant)?;
    Ok(Json(json!({ "url": url })))
}

/// `POST /oauth2/saml` with form field `SAMLResponse`.
pub async fn saml(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SamlForm>,
) -> Result<Json<TokenGrant>, ApiError> {
    let grant = Grant::Saml2Bearer {
        assertion: form.saml_response,
    };
    login_with(&state, &grant).await
}

/// `POST /oauth2/password` using the configured username and password.
pub async fn password(State(state): State<Arc<AppState>>) -> Result<Json<TokenGrant>, ApiError> {
    let grant = state.config.load().tenant.password_grant()?;
    login_with(&state, &grant).await
}

async fn login_with(state: &AppState, grant: &Grant) -> Result<Json<TokenGrant>, ApiError> {
    let exchanger = state.exchanger();
    let mut session = state.session.lock().await;
    let token = session.login_with(&exchanger, grant).await?;
    Ok(Json(token))
}

/// `GET /session`
pub async fn session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let session = state.session.lock().await;
    Json(SessionView::of(&session))
}

/// `POST /logout`
pub async fn logout(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    session.logout();
    Json(SessionView::of(&session))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

