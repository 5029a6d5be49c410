//! Extension points of the generic upload engine.
//!
//! The engine owns queueing, chunked transport, progress and the retry
//! back-off policy. Object-storage uploads plug into it through this trait
//! instead of overriding engine internals.

use std::sync::Arc;

use futures::future::BoxFuture;
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::{FileId, SessionData, UploadResult};

/// Where a completion ended up once the coordinator is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CompletionOutcome {
    /// Forwarded to the engine untouched (storage failure, or no confirmation
    /// endpoint configured).
    Delegated,
    /// The local server confirmed the object.
    Confirmed,
    /// Confirmation failed and the engine scheduled another attempt.
    RetryScheduled,
    /// Confirmation failed and the engine declined to retry.
    Failed,
    /// The file was removed, or completed again, while its confirmation was
    /// in flight. Nothing was reported to the engine.
    Discarded,
}

impl CompletionOutcome {
    /// Returns whether no further attempt will follow.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::RetryScheduled)
    }
}

/// Replays a failed confirmation request instead of re-uploading bytes.
pub type ReplayCallback = Arc<dyn Fn() -> BoxFuture<'static, CompletionOutcome> + Send + Sync>;

/// Hooks the generic upload engine exposes to object-storage uploads.
pub trait UploadEngine: Send + Sync {
    /// Returns the UUID the engine assigned to `id`.
    fn uuid(&self, id: FileId) -> Option<Uuid>;

    /// Returns the current filename of `id`.
    fn name(&self, id: FileId) -> Option<String>;

    /// Returns the identifier the transport layer reported for `id` after
    /// uploading it, which for object storage is the object key.
    fn third_party_id(&self, id: FileId) -> Option<String>;

    /// Registers a file restored from a previous session and returns its id.
    fn add_canned_file(&self, session: &SessionData) -> FileId;

    /// The engine's own completion handling: progress, callbacks, bookkeeping.
    fn on_complete(&self, id: FileId, name: &str, result: &UploadResult);

    /// Asks the engine to schedule an automatic retry.
    ///
    /// When `replay` is present the engine runs it instead of restarting the
    /// storage transfer. Returns `false` when the engine declines, for example
    /// because the retry budget is exhausted.
    fn on_auto_retry(
        &self,
        id: FileId,
        name: &str,
        result: &UploadResult,
        replay: Option<ReplayCallback>,
    ) -> bool;

    /// The engine's manual retry. `replay`, when present, is run instead of
    /// re-uploading if the engine decides a confirmation replay is the right
    /// action. Returns whether a retry was started.
    fn manual_retry(&self, id: FileId, replay: Option<ReplayCallback>) -> bool;
}
