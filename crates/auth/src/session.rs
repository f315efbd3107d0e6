//! Login state machine for one user session.
//!
//! ```text
//! Anonymous ──begin_login──▶ Redirecting ──callback(code)──▶ ExchangingToken
//!     ▲                                                        │ ok     │ err
//!     └────────────────logout──── Authenticated ◀──────────────┘        ▼
//!                                                            ExchangingToken{error}
//! ```
//!
//! A callback code is exchanged at most once per session, no matter how many
//! times the callback is delivered. The session remembers the most recent
//! `MAX_CONSUMED_CODES` codes.

use serde::Serialize;
use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};
use tenantgate_types::{
    CredentialStore, GateError, Grant, GrantExchanger, GrantKind, TenantCredentials, TokenGrant,
    is_defined, traits::Result,
};

use crate::authorize::build_authorize_url;

/// Codes remembered per session. The oldest is forgotten first.
pub(crate) const MAX_CONSUMED_CODES: usize = 256;

/// Where a session currently sits in the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginFlow {
    Anonymous,
    Redirecting {
        url: String,
    },
    ExchangingToken {
        code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Authenticated {
        grant_type: GrantKind,
    },
}

impl LoginFlow {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Redirecting { .. } => "redirecting",
            Self::ExchangingToken { .. } => "exchanging_token",
            Self::Authenticated { .. } => "authenticated",
        }
    }
}

/// Result of delivering a callback code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The code was exchanged and the session is now authenticated.
    Authenticated,
    /// The code was seen before or the session was already authenticated.
    /// No exchange was attempted.
    AlreadyHandled,
}

/// One user's session: the login flow plus the store it writes into.
pub struct SessionContext {
    store: Arc<dyn CredentialStore>,
    flow: LoginFlow,
    consumed_codes: HashSet<String>,
    consumed_order: VecDeque<String>,
}

impl SessionContext {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            flow: LoginFlow::Anonymous,
            consumed_codes: HashSet::new(),
            consumed_order: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &LoginFlow {
        &self.flow
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self.flow, LoginFlow::Authenticated { .. }) && self.store.is_authenticated()
    }

    /// Start (or restart) the code flow and return the authorize URL.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LocalRequest`] when already authenticated, or
    /// [`GateError::Configuration`] when tenant settings are missing.
    pub fn begin_login(&mut self, tenant: &TenantCredentials) -> Result<String> {
        if let LoginFlow::Authenticated { .. } = self.flow {
            return Err(already_authenticated());
        }
        let url = build_authorize_url(tenant)?;
        tracing::debug!(from = self.flow.name(), "redirecting to authorize endpoint");
        self.flow = LoginFlow::Redirecting { url: url.clone() };
        Ok(url)
    }

    /// Handle the redirect back from the authorize endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Authentication`] if `code` is blank or the
    /// exchange fails; the flow then records the error and stays in
    /// `ExchangingToken`.
    pub async fn handle_callback(
        &mut self,
        exchanger: &dyn GrantExchanger,
        code: &str,
    ) -> Result<CallbackOutcome> {
        if !is_defined(code) {
            return Err(GateError::auth("missing authorization code"));
        }
        if self.consumed_codes.contains(code) || matches!(self.flow, LoginFlow::Authenticated { .. })
        {
            tracing::debug!(state = self.flow.name(), "callback already handled, skipping exchange");
            return Ok(CallbackOutcome::AlreadyHandled);
        }

        // Authorization codes are single-use upstream, so a failed exchange
        // still consumes the code.
        self.consume(code);
        self.flow = LoginFlow::ExchangingToken {
            code: code.to_string(),
            error: None,
        };

        let grant = Grant::AuthorizationCode {
            code: code.to_string(),
        };
        match exchanger.exchange(&grant).await {
            Ok(token) => {
                self.authenticate(&token, GrantKind::AuthorizationCode);
                Ok(CallbackOutcome::Authenticated)
            }
            Err(e) => {
                tracing::warn!(error = %e, "authorization code exchange failed");
                self.flow = LoginFlow::ExchangingToken {
                    code: code.to_string(),
                    error: Some(e.to_string()),
                };
                Err(e)
            }
        }
    }

    /// Log in with a grant that needs no redirect (password, SAML).
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LocalRequest`] for an authorization code grant
    /// (those go through [`Self::handle_callback`]) or when already
    /// authenticated; otherwise whatever the exchange returns.
    pub async fn login_with(
        &mut self,
        exchanger: &dyn GrantExchanger,
        grant: &Grant,
    ) -> Result<TokenGrant> {
        if let LoginFlow::Authenticated { .. } = self.flow {
            return Err(already_authenticated());
        }
        if let Grant::AuthorizationCode { code } = grant {
            // Route through the callback path so the code is guarded too.
            return match self.handle_callback(exchanger, code).await? {
                CallbackOutcome::Authenticated => self.current_grant(),
                CallbackOutcome::AlreadyHandled => Err(GateError::LocalRequest(
                    "authorization code already used".into(),
                )),
            };
        }

        let token = exchanger.exchange(grant).await?;
        self.authenticate(&token, grant.kind());
        Ok(token)
    }

    /// Clear credentials and return to `Anonymous`. Consumed codes are kept.
    pub fn logout(&mut self) {
        self.store.clear_credentials();
        tracing::info!(from = self.flow.name(), "logged out");
        self.flow = LoginFlow::Anonymous;
    }

    fn consume(&mut self, code: &str) {
        if !self.consumed_codes.insert(code.to_string()) {
            return;
        }
        self.consumed_order.push_back(code.to_string());
        while self.consumed_order.len() > MAX_CONSUMED_CODES {
            if let Some(oldest) = self.consumed_order.pop_front() {
                self.consumed_codes.remove(&oldest);
            }
        }
    }

    fn authenticate(&mut self, token: &TokenGrant, kind: GrantKind) {
        self.store.set_credentials(token);
        self.flow = LoginFlow::Authenticated { grant_type: kind };
        tracing::info!(grant_type = %kind, "session authenticated");
    }

    fn current_grant(&self) -> Result<TokenGrant> {
        let credentials = self.store.credentials().ok_or(GateError::NotAuthenticated)?;
        let config = self.store.request_config().ok_or(GateError::NotAuthenticated)?;
        Ok(TokenGrant {
            config,
            payload: tenantgate_types::TokenPayload {
                token_type: Some(credentials.token_type),
                ..tenantgate_types::TokenPayload::bearer(credentials.access_token)
            },
        })
    }
}

fn already_authenticated() -> GateError {
    GateError::LocalRequest("session is already authenticated; log out first".into())
}
