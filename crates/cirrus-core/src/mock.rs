//! Mock engine and confirmation provider for testing.
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! cirrus-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cirrus_core::mock::{MockConfirmationProvider, MockReply, MockUploadEngine};
//!
//! let engine = MockUploadEngine::default().with_auto_retries(1);
//! let id = engine.add_file("a.png");
//!
//! let provider = MockConfirmationProvider::accepting();
//! provider.push_reply(MockReply::respond(500, json!({"error": "try again"})));
//! let service = provider.clone().into_service();
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use jiff::Timestamp;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::confirmation::{
    ConfirmationProvider, ConfirmationRequest, ConfirmationResponse, ConfirmationService,
};
use crate::engine::{ReplayCallback, UploadEngine};
use crate::{Error, FileId, Result, SessionData, UploadResult};

/// A scripted answer of the mock confirmation provider.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with a status code and JSON body.
    Respond {
        /// HTTP status code.
        status_code: u16,
        /// Response body.
        body: Value,
    },
    /// Fail without an answer, as a dropped connection would.
    Fail(String),
}

impl MockReply {
    /// Creates a reply with the given status and body.
    pub fn respond(status_code: u16, body: Value) -> Self {
        Self::Respond { status_code, body }
    }
}

#[derive(Debug)]
struct MockConfirmationState {
    replies: VecDeque<(MockReply, Option<Arc<Notify>>)>,
    fallback: MockReply,
    requests: Vec<ConfirmationRequest>,
}

/// Confirmation provider that answers from a script and records requests.
///
/// Clones share the script and the request log.
#[derive(Debug, Clone)]
pub struct MockConfirmationProvider {
    state: Arc<Mutex<MockConfirmationState>>,
}

impl Default for MockConfirmationProvider {
    fn default() -> Self {
        Self::accepting()
    }
}

impl MockConfirmationProvider {
    /// Creates a provider whose unscripted answer is `fallback`.
    pub fn new(fallback: MockReply) -> Self {
        let state = MockConfirmationState {
            replies: VecDeque::new(),
            fallback,
            requests: Vec::new(),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Creates a provider that confirms every object.
    pub fn accepting() -> Self {
        Self::new(MockReply::respond(200, json!({"success": true})))
    }

    /// Creates a provider that rejects every object.
    pub fn rejecting() -> Self {
        Self::new(MockReply::respond(
            500,
            json!({"success": false, "error": "rejected"}),
        ))
    }

    /// Queues a reply used before the fallback.
    pub fn push_reply(&self, reply: MockReply) {
        self.state.lock().replies.push_back((reply, None));
    }

    /// Queues a reply that is held back until `gate` is notified.
    ///
    /// The request is recorded as soon as it arrives.
    pub fn push_gated_reply(&self, reply: MockReply, gate: Arc<Notify>) {
        self.state.lock().replies.push_back((reply, Some(gate)));
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<ConfirmationRequest> {
        self.state.lock().requests.clone()
    }

    /// Returns how many requests were received.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Wraps this provider in a [`ConfirmationService`].
    pub fn into_service(self) -> ConfirmationService {
        ConfirmationService::new(self)
    }
}

#[async_trait::async_trait]
impl ConfirmationProvider for MockConfirmationProvider {
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        let started_at = Timestamp::now();
        let (reply, gate) = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            state
                .replies
                .pop_front()
                .unwrap_or_else(|| (state.fallback.clone(), None))
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }

        match reply {
            MockReply::Respond { status_code, body } => {
                let body = body.as_object().cloned().unwrap_or_default();
                Ok(ConfirmationResponse::new(
                    request.request_id,
                    status_code,
                    body,
                    started_at,
                ))
            }
            MockReply::Fail(message) => Err(Error::network_error().with_message(message)),
        }
    }
}

/// A file tracked by the mock engine.
#[derive(Debug, Clone)]
pub struct MockFile {
    /// Engine-assigned UUID.
    pub uuid: Uuid,
    /// Filename.
    pub name: String,
    /// Key the transport reported after upload.
    pub third_party_id: Option<String>,
}

#[derive(Default)]
struct MockEngineState {
    files: HashMap<FileId, MockFile>,
    next_id: u64,
    auto_retry_budget: u32,
    auto_retries_used: HashMap<FileId, u32>,
    completions: Vec<(FileId, UploadResult)>,
    auto_retries: Vec<(FileId, Option<ReplayCallback>)>,
    manual_retries: Vec<(FileId, Option<ReplayCallback>)>,
}

/// Upload engine double that records every hook invocation.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct MockUploadEngine {
    state: Arc<Mutex<MockEngineState>>,
}

impl std::fmt::Debug for MockUploadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockUploadEngine")
            .field("files", &state.files)
            .field("completions", &state.completions)
            .finish_non_exhaustive()
    }
}

impl MockUploadEngine {
    /// Allows `budget` automatic retries per file.
    #[must_use]
    pub fn with_auto_retries(self, budget: u32) -> Self {
        self.state.lock().auto_retry_budget = budget;
        self
    }

    /// Registers a file and returns its id.
    pub fn add_file(&self, name: impl Into<String>) -> FileId {
        self.insert(MockFile {
            uuid: Uuid::new_v4(),
            name: name.into(),
            third_party_id: None,
        })
    }

    /// Records the key the transport reported for `id`.
    pub fn set_third_party_id(&self, id: FileId, key: impl Into<String>) {
        if let Some(file) = self.state.lock().files.get_mut(&id) {
            file.third_party_id = Some(key.into());
        }
    }

    /// Returns a tracked file.
    pub fn file(&self, id: FileId) -> Option<MockFile> {
        self.state.lock().files.get(&id).cloned()
    }

    /// Returns every result forwarded to the engine's completion handling.
    pub fn completions(&self) -> Vec<(FileId, UploadResult)> {
        self.state.lock().completions.clone()
    }

    /// Returns the last result forwarded for `id`.
    pub fn last_completion(&self, id: FileId) -> Option<UploadResult> {
        self.state
            .lock()
            .completions
            .iter()
            .rev()
            .find(|(file_id, _)| *file_id == id)
            .map(|(_, result)| result.clone())
    }

    /// Returns how many automatic retries were requested for `id`.
    pub fn auto_retry_count(&self, id: FileId) -> usize {
        self.state
            .lock()
            .auto_retries
            .iter()
            .filter(|(file_id, _)| *file_id == id)
            .count()
    }

    /// Returns the replay supplied with the latest automatic retry of `id`.
    pub fn last_auto_retry_replay(&self, id: FileId) -> Option<ReplayCallback> {
        self.state
            .lock()
            .auto_retries
            .iter()
            .rev()
            .find(|(file_id, _)| *file_id == id)
            .and_then(|(_, replay)| replay.clone())
    }

    /// Returns the replays supplied with manual retries of `id`, in order.
    pub fn manual_retries(&self, id: FileId) -> Vec<Option<ReplayCallback>> {
        self.state
            .lock()
            .manual_retries
            .iter()
            .filter(|(file_id, _)| *file_id == id)
            .map(|(_, replay)| replay.clone())
            .collect()
    }

    fn insert(&self, file: MockFile) -> FileId {
        let mut state = self.state.lock();
        let id = FileId::new(state.next_id);
        state.next_id += 1;
        state.files.insert(id, file);
        id
    }
}

impl UploadEngine for MockUploadEngine {
    fn uuid(&self, id: FileId) -> Option<Uuid> {
        self.state.lock().files.get(&id).map(|file| file.uuid)
    }

    fn name(&self, id: FileId) -> Option<String> {
        self.state.lock().files.get(&id).map(|file| file.name.clone())
    }

    fn third_party_id(&self, id: FileId) -> Option<String> {
        self.state
            .lock()
            .files
            .get(&id)
            .and_then(|file| file.third_party_id.clone())
    }

    fn add_canned_file(&self, session: &SessionData) -> FileId {
        self.insert(MockFile {
            uuid: session.uuid,
            name: session.name.clone(),
            third_party_id: None,
        })
    }

    fn on_complete(&self, id: FileId, _name: &str, result: &UploadResult) {
        self.state.lock().completions.push((id, result.clone()));
    }

    fn on_auto_retry(
        &self,
        id: FileId,
        _name: &str,
        _result: &UploadResult,
        replay: Option<ReplayCallback>,
    ) -> bool {
        let mut state = self.state.lock();
        let budget = state.auto_retry_budget;
        let used = state.auto_retries_used.entry(id).or_default();
        if *used >= budget {
            return false;
        }
        *used += 1;
        state.auto_retries.push((id, replay));
        true
    }

    fn manual_retry(&self, id: FileId, replay: Option<ReplayCallback>) -> bool {
        let mut state = self.state.lock();
        if !state.files.contains_key(&id) {
            return false;
        }
        state.manual_retries.push((id, replay));
        true
    }
}
