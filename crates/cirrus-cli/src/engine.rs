//! A one-file upload engine for replaying a stored object's confirmation.

use cirrus_core::{FileId, ReplayCallback, SessionData, UploadEngine, UploadResult};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::TRACING_TARGET_REPLAY;

#[derive(Default)]
struct ReplayState {
    file: Option<SessionData>,
    result: Option<UploadResult>,
    replay: Option<ReplayCallback>,
    retries_left: u32,
}

/// Engine that tracks exactly one restored file.
///
/// Automatic retries are queued for the caller to run instead of being
/// scheduled on a timer.
pub struct ReplayEngine {
    state: Mutex<ReplayState>,
}

impl ReplayEngine {
    /// Identifier of the tracked file.
    pub const FILE_ID: FileId = FileId::new(0);

    /// Creates an engine allowing `retries` automatic replays.
    pub fn new(retries: u32) -> Self {
        let state = ReplayState {
            retries_left: retries,
            ..ReplayState::default()
        };

        Self {
            state: Mutex::new(state),
        }
    }

    /// Takes the replay queued by the last automatic retry.
    pub fn take_replay(&self) -> Option<ReplayCallback> {
        self.state.lock().replay.take()
    }

    /// Returns the result reported by the last completion.
    pub fn result(&self) -> Option<UploadResult> {
        self.state.lock().result.clone()
    }

    fn file<T>(&self, id: FileId, f: impl FnOnce(&SessionData) -> T) -> Option<T> {
        if id != Self::FILE_ID {
            return None;
        }

        self.state.lock().file.as_ref().map(f)
    }
}

impl UploadEngine for ReplayEngine {
    fn uuid(&self, id: FileId) -> Option<Uuid> {
        self.file(id, |file| file.uuid)
    }

    fn name(&self, id: FileId) -> Option<String> {
        self.file(id, |file| file.name.clone())
    }

    fn third_party_id(&self, id: FileId) -> Option<String> {
        self.file(id, |file| file.s3_key.clone()).flatten()
    }

    fn add_canned_file(&self, session: &SessionData) -> FileId {
        self.state.lock().file = Some(session.clone());
        Self::FILE_ID
    }

    fn on_complete(&self, id: FileId, _name: &str, result: &UploadResult) {
        tracing::debug!(
            target: TRACING_TARGET_REPLAY,
            file_id = %id,
            success = result.is_success(),
            "Completion reported"
        );

        self.state.lock().result = Some(result.clone());
    }

    fn on_auto_retry(
        &self,
        id: FileId,
        _name: &str,
        result: &UploadResult,
        replay: Option<ReplayCallback>,
    ) -> bool {
        let mut state = self.state.lock();
        state.result = Some(result.clone());

        let Some(replay) = replay else {
            tracing::warn!(
                target: TRACING_TARGET_REPLAY,
                file_id = %id,
                "The object must be uploaded again, nothing to replay"
            );
            return false;
        };

        if state.retries_left == 0 {
            return false;
        }

        state.retries_left -= 1;
        state.replay = Some(replay);
        true
    }

    fn manual_retry(&self, _id: FileId, _replay: Option<ReplayCallback>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    use cirrus_core::CompletionOutcome;

    use super::*;

    fn replay() -> ReplayCallback {
        Arc::new(|| {
            let confirmed: Pin<Box<dyn Future<Output = CompletionOutcome> + Send>> =
                Box::pin(async { CompletionOutcome::Confirmed });
            confirmed
        })
    }

    #[test]
    fn test_tracks_one_file() {
        let engine = ReplayEngine::new(0);
        let session = SessionData::new("a.png", Uuid::new_v4()).with_key("k.png");

        let id = engine.add_canned_file(&session);
        assert_eq!(engine.name(id).as_deref(), Some("a.png"));
        assert_eq!(engine.third_party_id(id).as_deref(), Some("k.png"));
        assert!(engine.name(FileId::new(7)).is_none());
    }

    #[test]
    fn test_retry_budget() {
        let engine = ReplayEngine::new(1);
        let failed = UploadResult::with_success(false);
        let id = ReplayEngine::FILE_ID;

        assert!(!engine.on_auto_retry(id, "a.png", &failed, None));
        assert!(engine.on_auto_retry(id, "a.png", &failed, Some(replay())));
        assert!(engine.take_replay().is_some());
        assert!(!engine.on_auto_retry(id, "a.png", &failed, Some(replay())));
        assert!(engine.take_replay().is_none());
        assert_eq!(engine.result(), Some(failed));
    }
}
