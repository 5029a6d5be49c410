//! Session-restore payloads for previously uploaded files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

/// One file entry of a persisted upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Original filename.
    pub name: String,
    /// UUID the file was uploaded under.
    pub uuid: Uuid,
    /// Size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Storage object key. Entries without one cannot be restored.
    #[serde(default, rename = "s3Key", skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
    /// Any other fields the session endpoint returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionData {
    /// Creates a session entry.
    pub fn new(name: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            name: name.into(),
            uuid,
            size: None,
            s3_key: None,
            extra: Map::new(),
        }
    }

    /// Sets the storage key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.s3_key = Some(key.into());
        self
    }

    /// Sets the size.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Returns the storage key.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::ErrorKind::MissingSessionKey`] when the entry has no
    /// non-empty key.
    pub fn require_key(&self) -> Result<&str> {
        self.s3_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::missing_session_key()
                    .with_message("The S3 key is missing from the session data")
                    .with_context(self.uuid.to_string())
            })
    }
}
