//! Manual retry of failed confirmations.

use std::sync::Arc;

use cirrus_core::{FileId, ReplayCallback, UploadEngine};
use dashmap::DashMap;

/// Tracing target for retry operations.
pub const TRACING_TARGET: &str = "cirrus_upload::retry";

/// Remembers, per file, the confirmation request to replay on manual retry.
///
/// An entry exists only while the last failure of that file was a
/// confirmation failure that can be replayed without re-uploading.
pub struct RetryCoordinator {
    engine: Arc<dyn UploadEngine>,
    pending: DashMap<FileId, ReplayCallback>,
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl RetryCoordinator {
    /// Creates a coordinator with no pending replays.
    pub fn new(engine: Arc<dyn UploadEngine>) -> Self {
        Self {
            engine,
            pending: DashMap::new(),
        }
    }

    /// Retries `id` through the engine's manual retry.
    ///
    /// A pending replay, if any, is handed to the engine so it can replay the
    /// confirmation instead of restarting the storage transfer. Returns whether
    /// the engine started a retry.
    pub fn retry(&self, id: FileId) -> bool {
        let replay = self.pending(id);

        tracing::debug!(
            target: TRACING_TARGET,
            file_id = %id,
            has_replay = replay.is_some(),
            "Manual retry requested"
        );

        let started = self.engine.manual_retry(id, replay);
        if !started {
            tracing::warn!(
                target: TRACING_TARGET,
                file_id = %id,
                "Engine declined manual retry"
            );
        }

        started
    }

    /// Returns the pending replay of `id`.
    pub fn pending(&self, id: FileId) -> Option<ReplayCallback> {
        self.pending.get(&id).map(|replay| Arc::clone(&replay))
    }

    /// Returns whether `id` has a pending replay.
    pub fn has_pending(&self, id: FileId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Returns how many files have a pending replay.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn store(&self, id: FileId, replay: ReplayCallback) {
        self.pending.insert(id, replay);
    }

    pub(crate) fn remove(&self, id: FileId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub(crate) fn clear(&self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use cirrus_core::CompletionOutcome;
    use cirrus_core::mock::MockUploadEngine;
    use futures::FutureExt;

    use super::*;

    fn replay() -> ReplayCallback {
        Arc::new(|| async { CompletionOutcome::Confirmed }.boxed())
    }

    #[test]
    fn test_retry_hands_over_pending_replay() {
        let engine = MockUploadEngine::default();
        let id = engine.add_file("a.png");
        let retry = RetryCoordinator::new(Arc::new(engine.clone()));

        assert!(retry.retry(id));
        retry.store(id, replay());
        assert!(retry.retry(id));

        let calls = engine.manual_retries(id);
        assert_eq!(calls.len(), 2);
        assert!(calls[0].is_none());
        assert!(calls[1].is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let engine = MockUploadEngine::default();
        let retry = RetryCoordinator::new(Arc::new(engine));

        retry.store(FileId::new(1), replay());
        retry.store(FileId::new(2), replay());
        assert!(retry.remove(FileId::new(1)));
        assert!(!retry.remove(FileId::new(1)));
        assert_eq!(retry.pending_count(), 1);

        retry.clear();
        assert!(!retry.has_pending(FileId::new(2)));
    }
}
