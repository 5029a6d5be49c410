//! Files restored from a previous session.

use std::sync::Arc;

use cirrus_core::{FileId, Result, SessionData, UploadEngine};
use dashmap::DashMap;

/// Tracing target for canned file operations.
pub const TRACING_TARGET: &str = "cirrus_upload::canned";

/// Remembers the storage keys of files restored from a prior session.
pub struct CannedFileRegistry {
    engine: Arc<dyn UploadEngine>,
    keys: DashMap<FileId, String>,
}

impl std::fmt::Debug for CannedFileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CannedFileRegistry")
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl CannedFileRegistry {
    /// Creates an empty registry backed by `engine`.
    pub fn new(engine: Arc<dyn UploadEngine>) -> Self {
        Self {
            engine,
            keys: DashMap::new(),
        }
    }

    /// Registers a restored file with the engine and records its key.
    ///
    /// # Errors
    ///
    /// Fails with [`cirrus_core::ErrorKind::MissingSessionKey`] when `session`
    /// has no storage key. No file is created with the engine in that case.
    pub fn add(&self, session: &SessionData) -> Result<FileId> {
        let key = session.require_key().inspect_err(|error| {
            tracing::error!(
                target: TRACING_TARGET,
                uuid = %session.uuid,
                name = %session.name,
                error = %error,
                "Cannot restore canned file without a storage key"
            );
        })?;

        let id = self.engine.add_canned_file(session);
        self.keys.insert(id, key.to_owned());

        tracing::debug!(
            target: TRACING_TARGET,
            file_id = %id,
            uuid = %session.uuid,
            key = key,
            "Canned file restored"
        );

        Ok(id)
    }

    /// Returns the storage key of `id`.
    ///
    /// Canned files answer from the registry; everything else falls back to
    /// the key the transport reported.
    pub fn key(&self, id: FileId) -> Option<String> {
        self.keys
            .get(&id)
            .map(|key| key.clone())
            .or_else(|| self.engine.third_party_id(id))
    }

    /// Returns whether `id` was restored from a session.
    pub fn contains(&self, id: FileId) -> bool {
        self.keys.contains_key(&id)
    }

    pub(crate) fn clear(&self) {
        self.keys.clear();
    }
}
