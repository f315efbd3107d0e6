//! In-memory credential store backed by a `Mutex`.

use std::sync::{Mutex, MutexGuard};
use tenantgate_types::{CredentialStore, Credentials, RequestConfig, TokenGrant};

#[derive(Debug, Clone)]
struct Held {
    credentials: Credentials,
    config: RequestConfig,
}

/// An in-memory [`CredentialStore`] holding at most one session's token.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    held: Mutex<Option<Held>>,
}

impl InMemoryCredentialStore {
    /// Creates a new, unauthenticated store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Held>> {
        // The guarded value is replaced wholesale, so a poisoned lock still
        // holds a consistent snapshot.
        self.held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn set_credentials(&self, grant: &TokenGrant) {
        let held = Held {
            credentials: grant.credentials(),
            config: grant.config.clone(),
        };
        tracing::debug!(base_url = %held.config.base_url, "credentials stored");
        *self.lock() = Some(held);
    }

    fn clear_credentials(&self) {
        if self.lock().take().is_some() {
            tracing::debug!("credentials cleared");
        }
    }

    fn credentials(&self) -> Option<Credentials> {
        self.lock().as_ref().map(|h| h.credentials.clone())
    }

    fn request_config(&self) -> Option<RequestConfig> {
        self.lock().as_ref().map(|h| h.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgate_types::{GateError, TokenPayload};

    fn grant(token: &str) -> TokenGrant {
        TokenGrant {
            config: RequestConfig::for_tenant("https://acme.example.com", "key"),
            payload: TokenPayload::bearer(token),
        }
    }

    #[test]
    fn test_unauthenticated_by_default() {
        let store = InMemoryCredentialStore::new();
        assert!(!store.is_authenticated());
        assert!(store.credentials().is_none());
        assert!(store.request_config().is_none());
    }

    #[test]
    fn test_auth_header_before_set_fails() {
        let store = InMemoryCredentialStore::new();
        assert!(matches!(
            store.auth_header(),
            Err(GateError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_set_then_authenticated() {
        let store = InMemoryCredentialStore::new();
        store.set_credentials(&grant("tok"));
        assert!(store.is_authenticated());
        assert_eq!(store.auth_header().unwrap(), "Bearer tok");
        assert_eq!(
            store.request_config().unwrap().base_url,
            "https://acme.example.com"
        );
    }

    #[test]
    fn test_token_type_from_payload() {
        let store = InMemoryCredentialStore::new();
        let mut g = grant("tok");
        g.payload.token_type = Some("MAC".into());
        store.set_credentials(&g);
        assert_eq!(store.auth_header().unwrap(), "MAC tok");
    }

    #[test]
    fn test_overwrite() {
        let store = InMemoryCredentialStore::new();
        store.set_credentials(&grant("first"));
        store.set_credentials(&grant("second"));
        assert_eq!(store.auth_header().unwrap(), "Bearer second");
    }

    #[test]
    fn test_clear() {
        let store = InMemoryCredentialStore::new();
        store.set_credentials(&grant("tok"));
        store.clear_credentials();
        assert!(!store.is_authenticated());
        assert!(store.auth_header().is_err());
        // Clearing twice is harmless.
        store.clear_credentials();
    }

    #[test]
    fn test_empty_config_is_not_authenticated() {
        let store = InMemoryCredentialStore::new();
        let mut g = grant("tok");
        g.config.base_url = String::new();
        store.set_credentials(&g);
        assert!(!store.is_authenticated());
        // The header can still be produced; only the pair counts as a session.
        assert_eq!(store.auth_header().unwrap(), "Bearer tok");
    }

    #[test]
    fn test_payload_roundtrip_through_store() {
        let store = InMemoryCredentialStore::new();
        let g: TokenGrant = serde_json::from_value(serde_json::json!({
            "config": {"baseURL": "https://h", "headers": {"apikey": "k"}},
            "jwt": {"access_token": "abc", "token_type": "Bearer"}
        }))
        .unwrap();
        store.set_credentials(&g);
        assert!(store.is_authenticated());
        assert_eq!(store.request_config().unwrap().headers["apikey"], "k");
    }
}
