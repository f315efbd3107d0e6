//! Core types and traits for the tenantgate workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! gateway: the error taxonomy, OAuth grant and token representations, the
//! request descriptor forwarded by the authenticated proxy, and the traits
//! that the store and auth layers implement.

pub mod credentials;
pub mod error;
pub mod grant;
pub mod request;
pub mod traits;

pub use credentials::{Credentials, RequestConfig, TenantCredentials, TokenGrant, TokenPayload};
pub use error::GateError;
pub use grant::{Grant, GrantKind};
pub use request::{
    FailureKind, HttpMethod, ProxyFailure, ProxyResult, RequestDescriptor, Upload, UploadFile,
};
pub use traits::{CredentialStore, GrantExchanger};

/// Returns `true` when `value` holds at least one non-whitespace character.
///
/// Tenant secrets and callback parameters are checked with this predicate
/// rather than a plain presence test, so `""` and `"  "` count as missing.
#[must_use]
pub fn is_defined(value: &str) -> bool {
    !value.trim().is_empty()
}
