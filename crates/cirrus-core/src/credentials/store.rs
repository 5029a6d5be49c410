//! Active credential storage and expiry refresh.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::{Credentials, RawCredentials, TRACING_TARGET};
use crate::{Error, ErrorKind, Result};

/// Integrator hook invoked when the transport reports expired credentials.
///
/// Returning `None` means the hook produced no deferred result at all, which is
/// treated as a refresh failure. The deferred result rejects with an optional
/// reason.
pub type ExpiryHook = Arc<
    dyn Fn() -> Option<BoxFuture<'static, std::result::Result<RawCredentials, Option<String>>>>
        + Send
        + Sync,
>;

/// Credentials source injected into the signing transport.
#[async_trait::async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Returns the currently active credentials, if any.
    fn get(&self) -> Option<Credentials>;

    /// Called by the transport when the active credentials were rejected as
    /// expired. Resolves once fresh credentials are active.
    async fn on_expired(&self) -> Result<()>;
}

#[derive(Default)]
struct Active {
    credentials: Option<Credentials>,
    generation: u64,
}

struct CredentialStoreInner {
    active: RwLock<Active>,
    refresh: Mutex<()>,
    on_expired: Option<ExpiryHook>,
}

/// Holds the active signing credentials for an upload session.
///
/// Cloning is cheap; all clones share the same credentials.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<CredentialStoreInner>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.inner.active.read();
        f.debug_struct("CredentialStore")
            .field("credentials", &active.credentials)
            .field("generation", &active.generation)
            .field("has_expiry_hook", &self.inner.on_expired.is_some())
            .finish()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CredentialStore {
    /// Creates an empty store with an optional expiry hook.
    pub fn new(on_expired: Option<ExpiryHook>) -> Self {
        let inner = CredentialStoreInner {
            active: RwLock::new(Active::default()),
            refresh: Mutex::new(()),
            on_expired,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Replaces the active credentials.
    ///
    /// Returns `Ok(true)` when credentials were set and `Ok(false)` when they
    /// were intentionally left empty, in which case the caller falls back to a
    /// bare access key.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::InvalidCredentials`] when a secret key is present
    /// without an access key or expiration, or when `raw` is empty and
    /// `allow_empty` is false.
    pub fn set_credentials(&self, raw: &RawCredentials, allow_empty: bool) -> Result<bool> {
        if raw.has_secret_key() {
            let credentials = raw.validate()?;

            tracing::debug!(
                target: TRACING_TARGET,
                access_key = %credentials.access_key_masked(),
                expiration = %credentials.expiration(),
                "Credentials updated"
            );

            let mut active = self.inner.active.write();
            active.credentials = Some(credentials);
            active.generation += 1;
            return Ok(true);
        }

        if !allow_empty {
            return Err(Error::new(ErrorKind::InvalidCredentials)
                .with_message("Invalid credentials parameter!"));
        }

        let mut active = self.inner.active.write();
        active.credentials = None;
        active.generation += 1;
        Ok(false)
    }

    /// Returns the active credentials, if any.
    pub fn active(&self) -> Option<Credentials> {
        self.inner.active.read().credentials.clone()
    }

    /// Returns how many times the active value has been replaced.
    pub fn generation(&self) -> u64 {
        self.inner.active.read().generation
    }

    /// Runs the expiry hook and installs the credentials it resolves with.
    ///
    /// Concurrent callers are serialized; a caller that waited while another
    /// refresh replaced the credentials returns without invoking the hook again.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::CredentialsRefresh`] when no hook is configured,
    /// the hook returns no deferred result, the deferred result rejects, or it
    /// resolves with invalid credentials. The active credentials are left
    /// untouched in every failure case.
    pub async fn refresh(&self) -> Result<()> {
        let observed = self.generation();
        let _guard = self.inner.refresh.lock().await;

        if self.generation() != observed {
            tracing::debug!(
                target: TRACING_TARGET,
                "Credentials already refreshed by a concurrent caller"
            );
            return Ok(());
        }

        let Some(hook) = self.inner.on_expired.as_ref() else {
            tracing::error!(
                target: TRACING_TARGET,
                "Credentials expired and no onCredentialsExpired callback is configured"
            );
            return Err(Error::credentials_refresh(
                "no onCredentialsExpired callback configured",
            ));
        };

        let Some(pending) = hook() else {
            tracing::error!(
                target: TRACING_TARGET,
                "onCredentialsExpired callback did not return a deferred result"
            );
            return Err(Error::credentials_refresh(
                "Unexpected return value for onCredentialsExpired.",
            ));
        };

        match pending.await {
            Ok(raw) => match self.set_credentials(&raw, false) {
                Ok(_) => {
                    tracing::info!(target: TRACING_TARGET, "Expired credentials refreshed");
                    Ok(())
                }
                Err(error) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        error = %error,
                        "Invalid credentials returned from onCredentialsExpired callback"
                    );
                    Err(Error::credentials_refresh(
                        "onCredentialsExpired did not return valid credentials.",
                    )
                    .with_source(error))
                }
            },
            Err(reason) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    reason = reason.as_deref().unwrap_or("null"),
                    "onCredentialsExpired callback indicated failure"
                );
                Err(Error::credentials_refresh(
                    "onCredentialsExpired callback failed.",
                ))
            }
        }
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for CredentialStore {
    fn get(&self) -> Option<Credentials> {
        self.active()
    }

    async fn on_expired(&self) -> Result<()> {
        self.refresh().await
    }
}
