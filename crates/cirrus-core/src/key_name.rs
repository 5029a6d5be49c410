//! Storage object key naming.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{Error, FileId, Result};

/// Tracing target for key naming.
pub const TRACING_TARGET: &str = "cirrus_core::key_name";

/// What an integrator key-name function hands back.
pub enum KeyNameOutput {
    /// A value known immediately. `None` is a failure.
    Ready(Option<String>),
    /// A value computed later; rejects with an optional reason.
    Deferred(BoxFuture<'static, std::result::Result<String, Option<String>>>),
}

impl KeyNameOutput {
    /// Wraps an immediately known key.
    pub fn ready(key: impl Into<String>) -> Self {
        Self::Ready(Some(key.into()))
    }

    /// Wraps a key that is computed asynchronously.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = std::result::Result<String, Option<String>>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    /// Normalizes both shapes into one deferred result.
    pub fn into_future(self) -> BoxFuture<'static, std::result::Result<String, Option<String>>> {
        match self {
            Self::Ready(Some(key)) => futures::future::ready(Ok(key)).boxed(),
            Self::Ready(None) => futures::future::ready(Err(None)).boxed(),
            Self::Deferred(future) => future,
        }
    }
}

/// Integrator-supplied key-name function, called with the file id.
pub type KeyNameFn = Arc<dyn Fn(FileId) -> KeyNameOutput + Send + Sync>;

/// How the storage key of a file is chosen.
#[derive(Clone, Default)]
pub enum KeyNameStrategy {
    /// The file's UUID plus the original extension.
    #[default]
    Uuid,
    /// The original filename, unchanged.
    Filename,
    /// Whatever the integrator function returns, used verbatim.
    Function(KeyNameFn),
}

impl KeyNameStrategy {
    /// Creates a function strategy.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(FileId) -> KeyNameOutput + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// Returns the configuration name of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Filename => "filename",
            Self::Function(_) => "function",
        }
    }
}

impl fmt::Debug for KeyNameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyNameStrategy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "uuid" => Ok(Self::Uuid),
            "filename" => Ok(Self::Filename),
            other => {
                tracing::error!(
                    target: TRACING_TARGET,
                    value = other,
                    "Invalid keyname value"
                );
                Err(Error::configuration()
                    .with_message(format!("Invalid keyname value: {other}"))
                    .with_context("objectProperties.key"))
            }
        }
    }
}

impl Serialize for KeyNameStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KeyNameStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Returns the extension of `filename`, if it has a non-empty one.
pub fn extension(filename: &str) -> Option<&str> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Computes storage keys from a [`KeyNameStrategy`].
#[derive(Debug, Clone, Default)]
pub struct KeyNameResolver {
    strategy: KeyNameStrategy,
}

impl KeyNameResolver {
    /// Creates a resolver for the given strategy.
    pub fn new(strategy: KeyNameStrategy) -> Self {
        Self { strategy }
    }

    /// Returns the configured strategy.
    pub fn strategy(&self) -> &KeyNameStrategy {
        &self.strategy
    }

    /// Resolves the storage key for one file.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::ErrorKind::KeyResolution`] when the integrator
    /// function returns nothing or its deferred result rejects.
    pub async fn resolve(&self, id: FileId, uuid: Uuid, filename: &str) -> Result<String> {
        let key = match &self.strategy {
            KeyNameStrategy::Uuid => match extension(filename) {
                Some(ext) => format!("{uuid}.{ext}"),
                None => uuid.to_string(),
            },
            KeyNameStrategy::Filename => filename.to_owned(),
            KeyNameStrategy::Function(f) => f(id).into_future().await.map_err(|reason| {
                let reason = reason.unwrap_or_else(|| "null".to_owned());
                tracing::error!(
                    target: TRACING_TARGET,
                    file_id = %id,
                    reason = %reason,
                    "Failed to retrieve key name"
                );
                Error::key_resolution()
                    .with_message(reason)
                    .with_context(format!("file {id}"))
            })?,
        };

        tracing::trace!(
            target: TRACING_TARGET,
            file_id = %id,
            strategy = self.strategy.as_str(),
            key = %key,
            "Key name resolved"
        );

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn uuid() -> Uuid {
        "0b8a3c2e-8d44-4a2b-9f8e-3f1c2d4b5a6e".parse().unwrap()
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a.png"), Some("png"));
        assert_eq!(extension("archive.tar.gz"), Some("gz"));
        assert_eq!(extension("README"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[tokio::test]
    async fn test_uuid_strategy_appends_extension() {
        let resolver = KeyNameResolver::new(KeyNameStrategy::Uuid);
        let key = resolver.resolve(FileId::new(0), uuid(), "a.png").await.unwrap();
        assert_eq!(key, format!("{}.png", uuid()));

        let key = resolver.resolve(FileId::new(0), uuid(), "Makefile").await.unwrap();
        assert_eq!(key, uuid().to_string());
    }

    #[tokio::test]
    async fn test_filename_strategy() {
        let resolver = KeyNameResolver::new(KeyNameStrategy::Filename);
        let key = resolver.resolve(FileId::new(0), uuid(), "a.png").await.unwrap();
        assert_eq!(key, "a.png");
    }

    #[tokio::test]
    async fn test_function_strategy_is_used_verbatim() {
        let resolver = KeyNameResolver::new(KeyNameStrategy::function(|id| {
            KeyNameOutput::ready(format!("uploads/{id}"))
        }));
        let key = resolver.resolve(FileId::new(7), uuid(), "a.png").await.unwrap();
        assert_eq!(key, "uploads/7");

        let resolver = KeyNameResolver::new(KeyNameStrategy::function(|_| {
            KeyNameOutput::deferred(async { Ok("deferred-key".to_owned()) })
        }));
        let key = resolver.resolve(FileId::new(7), uuid(), "a.png").await.unwrap();
        assert_eq!(key, "deferred-key");
    }

    #[tokio::test]
    async fn test_function_returning_null_fails() {
        let resolver =
            KeyNameResolver::new(KeyNameStrategy::function(|_| KeyNameOutput::Ready(None)));
        let error = resolver
            .resolve(FileId::new(1), uuid(), "a.png")
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::KeyResolution);
        assert_eq!(error.message.as_deref(), Some("null"));
    }

    #[tokio::test]
    async fn test_function_rejection_carries_reason() {
        let resolver = KeyNameResolver::new(KeyNameStrategy::function(|_| {
            KeyNameOutput::deferred(async { Err(Some("denied".to_owned())) })
        }));
        let error = resolver
            .resolve(FileId::new(1), uuid(), "a.png")
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::KeyResolution);
        assert_eq!(error.message.as_deref(), Some("denied"));
    }

    #[test]
    fn test_strategy_from_str() {
        assert!(matches!("uuid".parse::<KeyNameStrategy>(), Ok(KeyNameStrategy::Uuid)));
        assert!(matches!("filename".parse::<KeyNameStrategy>(), Ok(KeyNameStrategy::Filename)));

        let error = "timestamp".parse::<KeyNameStrategy>().unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
        assert!(error.to_string().contains("timestamp"));
    }

    #[test]
    fn test_strategy_serde() {
        let strategy: KeyNameStrategy = serde_json::from_str("\"filename\"").unwrap();
        assert!(matches!(strategy, KeyNameStrategy::Filename));
        assert_eq!(serde_json::to_string(&strategy).unwrap(), "\"filename\"");
        assert!(serde_json::from_str::<KeyNameStrategy>("\"bogus\"").is_err());
    }
}
