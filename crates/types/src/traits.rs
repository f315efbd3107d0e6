//! Traits shared across tenantgate crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `tenantgate-types`, not on each other.

use crate::{Credentials, GateError, Grant, RequestConfig, TokenGrant};
use async_trait::async_trait;

pub use crate::error::Result;

/// Converts one initial-authentication proof into a bearer token.
///
/// Implementations perform exactly one token endpoint call per invocation and
/// never retry. They must not touch any credential store; storing the result
/// is the caller's job.
#[async_trait]
pub trait GrantExchanger: Send + Sync {
    async fn exchange(&self, grant: &Grant) -> Result<TokenGrant>;
}

/// Session-scoped holder for the current credentials and request config.
///
/// State only changes on discrete session events (login, logout), so the
/// methods are synchronous.
pub trait CredentialStore: Send + Sync {
    /// Store a fresh grant, replacing whatever was held before.
    fn set_credentials(&self, grant: &TokenGrant);

    /// Drop the held credentials and config.
    fn clear_credentials(&self);

    /// The current credentials, if any.
    fn credentials(&self) -> Option<Credentials>;

    /// The current request config, if any.
    fn request_config(&self) -> Option<RequestConfig>;

    /// `true` iff both credentials and config are present and non-empty.
    fn is_authenticated(&self) -> bool {
        let creds = self.credentials().is_some_and(|c| !c.is_empty());
        let config = self.request_config().is_some_and(|c| !c.is_empty());
        creds && config
    }

    /// The formatted `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::NotAuthenticated`] when no credentials are held.
    fn auth_header(&self) -> Result<String> {
        self.credentials()
            .filter(|c| !c.is_empty())
            .map(|c| c.auth_header())
            .ok_or(GateError::NotAuthenticated)
    }
}
