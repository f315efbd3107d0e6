//! OAuth 2.0 grants accepted by the tenant token endpoint.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Wire value of the SAML 2.0 bearer assertion grant.
pub const SAML2_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:saml2-bearer";

/// One initial-authentication proof, exchanged once for a bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum Grant {
    /// Three-legged flow: the code the authorize endpoint redirected back with.
    AuthorizationCode { code: String },
    /// Resource-owner password grant.
    Password { username: String, password: String },
    /// SAML assertion issued by the tenant's identity provider.
    #[serde(rename = "saml2-bearer")]
    Saml2Bearer { assertion: String },
}

impl Grant {
    #[must_use]
    pub fn kind(&self) -> GrantKind {
        match self {
            Self::AuthorizationCode { .. } => GrantKind::AuthorizationCode,
            Self::Password { .. } => GrantKind::Password,
            Self::Saml2Bearer { .. } => GrantKind::Saml2Bearer,
        }
    }

    /// The `grant_type` form value sent to the token endpoint.
    #[must_use]
    pub fn grant_type(&self) -> &'static str {
        self.kind().grant_type()
    }

    /// Grant-specific form fields, in wire order.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::AuthorizationCode { code } => vec![("code", code.as_str())],
            Self::Password { username, password } => {
                vec![("username", username.as_str()), ("password", password.as_str())]
            }
            Self::Saml2Bearer { assertion } => vec![("assertion", assertion.as_str())],
        }
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationCode { code } => f
                .debug_struct("AuthorizationCode")
                .field("code", code)
                .finish(),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Saml2Bearer { assertion } => f
                .debug_struct("Saml2Bearer")
                .field("assertion_len", &assertion.len())
                .finish(),
        }
    }
}

/// Grant type without its payload; used for CLI selection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    AuthorizationCode,
    Password,
    #[serde(rename = "saml2-bearer")]
    Saml2Bearer,
}

impl GrantKind {
    #[must_use]
    pub fn grant_type(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Password => "password",
            Self::Saml2Bearer => SAML2_BEARER_GRANT_TYPE,
        }
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Password => "password",
            Self::Saml2Bearer => "saml2-bearer",
        };
        f.write_str(s)
    }
}

impl FromStr for GrantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "authorization_code" | "authorization-code" | "code" => Ok(Self::AuthorizationCode),
            "password" => Ok(Self::Password),
            "saml2-bearer" | "saml" | "saml2" => Ok(Self::Saml2Bearer),
            s if s == SAML2_BEARER_GRANT_TYPE => Ok(Self::Saml2Bearer),
            other => Err(format!("unknown grant type: {other}")),
        }
    }
}
