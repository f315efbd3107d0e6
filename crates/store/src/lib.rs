//! Session-scoped credential storage.
//!
//! Credentials live only in memory for the lifetime of a session; nothing is
//! written to disk.

pub mod memory;

pub use memory::InMemoryCredentialStore;
