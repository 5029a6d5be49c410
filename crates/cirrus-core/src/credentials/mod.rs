//! Signing credentials and their expiry lifecycle.
//!
//! Credentials are validated on the way in, held by a [`CredentialStore`] and
//! handed to the signing transport through the [`CredentialsProvider`] trait.
//! When the transport reports them as expired, the store runs the integrator's
//! [`ExpiryHook`] and installs whatever it resolves with.

mod store;
mod types;

pub use store::{CredentialStore, CredentialsProvider, ExpiryHook};
pub use types::{Credentials, Expiration, RawCredentials};

/// Tracing target for credential operations.
pub const TRACING_TARGET: &str = "cirrus_core::credentials";
