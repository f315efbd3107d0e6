//! Unified error type for the tenantgate workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across tenantgate crates.
#[derive(Debug, Error)]
pub enum GateError {
    /// Tenant secrets or other required settings are missing or blank.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token endpoint rejected the grant, or could not be reached.
    ///
    /// `status` is `None` when no response was received.
    #[error("authentication error: status={}, body={body}", status_label(.status))]
    Authentication { status: Option<u16>, body: String },

    /// A credential was requested before any token was stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The vendor API returned a non-success status.
    #[error("upstream error: status={status}, body={body}")]
    Upstream { status: u16, body: String },

    /// HTTP transport error; no response was received.
    #[error("network error: {0}")]
    Network(String),

    /// The caller's request could not be turned into an HTTP call.
    #[error("invalid request: {0}")]
    LocalRequest(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A vendor payload (query result, CSV) could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),
}

#[allow(clippy::ref_option)]
fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl GateError {
    /// Shorthand for an [`GateError::Authentication`] with no upstream response.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            status: None,
            body: message.into(),
        }
    }

    /// The vendor status code carried by this error, if any.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_configuration() {
        let err = GateError::Configuration("client_secret is not set".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: client_secret is not set"
        );
    }

    #[test]
    fn test_error_display_authentication_with_status() {
        let err = GateError::Authentication {
            status: Some(400),
            body: "invalid_grant".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("400"));
        assert!(s.contains("invalid_grant"));
    }

    #[test]
    fn test_error_display_authentication_without_response() {
        let err = GateError::auth("connection refused");
        assert_eq!(
            err.to_string(),
            "authentication error: status=none, body=connection refused"
        );
    }

    #[test]
    fn test_error_display_upstream() {
        let err = GateError::Upstream {
            status: 401,
            body: "expired".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("401"));
        assert!(s.contains("expired"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid {{{").unwrap_err();
        let err: GateError = json_err.into();
        assert!(matches!(err, GateError::Serialization(_)));
    }

    #[test]
    fn test_upstream_status() {
        assert_eq!(
            GateError::Upstream {
                status: 503,
                body: String::new()
            }
            .upstream_status(),
            Some(503)
        );
        assert_eq!(GateError::auth("x").upstream_status(), None);
        assert_eq!(GateError::NotAuthenticated.upstream_status(), None);
        assert_eq!(
            GateError::Network("reset".into()).upstream_status(),
            None
        );
    }
}
