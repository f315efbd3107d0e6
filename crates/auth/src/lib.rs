//! OAuth 2.0 grant exchange and login flows for a tenant.
//!
//! [`exchange`] turns a grant into a bearer token, [`session`] drives the
//! browser login state machine, and [`login`] wires both to the CLI with a
//! loopback [`callback`] listener.

pub mod authorize;
pub mod callback;
pub mod exchange;
pub mod login;
pub mod session;

pub use exchange::{TokenExchanger, TokenRequest};
pub use session::{CallbackOutcome, LoginFlow, SessionContext};
