//! Completion confirmation state machine.
//!
//! Once the storage layer reports a finished upload, a file moves through:
//!
//! ```text
//! StorageDone ──(failure, or no endpoint)──────────────▶ Delegated
//!      │
//!      └─(success)─▶ AwaitingConfirmation ──(accepted)─▶ Confirmed
//!                           │
//!                           ├─(rejected, reset)────────▶ auto retry, no replay
//!                           └─(rejected)───────────────▶ auto retry with replay
//! ```
//!
//! A declined automatic retry reports the merged failure to the engine.
//!
//! Every pass through `StorageDone` starts a new attempt. A confirmation whose
//! attempt was superseded, or whose file was removed, settles as
//! `Discarded` without touching the engine or the pending replays.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cirrus_core::endpoint::bucket_from_endpoint;
use cirrus_core::{
    CompletionOutcome, ConfirmationRequest, ConfirmationResponse, ConfirmationService, CorsOptions,
    Error, FileId, ReplayCallback, Result, UploadEngine, UploadResult,
};
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use url::Url;

use crate::canned::CannedFileRegistry;
use crate::keyed_mutex::KeyedMutex;
use crate::params::{EndpointStore, UploadSuccessParamsStore};
use crate::retry::RetryCoordinator;

/// Tracing target for completion operations.
pub const TRACING_TARGET: &str = "cirrus_upload::completion";

/// Confirmation request options shared by every file.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationSettings {
    /// Confirmation endpoint; `None` disables confirmation.
    pub endpoint: Option<Url>,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Cross-origin behaviour.
    pub cors: CorsOptions,
}

struct CompletionInner {
    engine: Arc<dyn UploadEngine>,
    service: ConfirmationService,
    settings: ConfirmationSettings,
    params: Arc<UploadSuccessParamsStore>,
    endpoints: Arc<EndpointStore>,
    canned: Arc<CannedFileRegistry>,
    retry: Arc<RetryCoordinator>,
    locks: KeyedMutex,
    /// Live attempt per file. Kept only while a confirmation is in flight or
    /// a replay of it is pending.
    attempts: DashMap<FileId, u64>,
    next_attempt: AtomicU64,
}

/// Decides what happens to a file after its storage upload finished.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct CompletionCoordinator {
    inner: Arc<CompletionInner>,
}

impl std::fmt::Debug for CompletionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCoordinator")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl CompletionCoordinator {
    /// Creates a coordinator over the session's shared stores.
    pub fn new(
        engine: Arc<dyn UploadEngine>,
        service: ConfirmationService,
        settings: ConfirmationSettings,
        params: Arc<UploadSuccessParamsStore>,
        endpoints: Arc<EndpointStore>,
        canned: Arc<CannedFileRegistry>,
        retry: Arc<RetryCoordinator>,
    ) -> Self {
        let inner = CompletionInner {
            engine,
            service,
            settings,
            params,
            endpoints,
            canned,
            retry,
            locks: KeyedMutex::default(),
            attempts: DashMap::new(),
            next_attempt: AtomicU64::new(0),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the confirmation settings.
    pub fn settings(&self) -> &ConfirmationSettings {
        &self.inner.settings
    }

    /// Handles the storage-layer result of `id`.
    ///
    /// Resolves once the engine was told the final outcome or a retry was
    /// scheduled, which keeps the engine's completion notification open until
    /// confirmation settles.
    pub async fn on_complete(&self, id: FileId, result: UploadResult) -> CompletionOutcome {
        let name = self.inner.engine.name(id).unwrap_or_default();

        let Some(endpoint) = self.inner.settings.endpoint.clone() else {
            return self.delegate(id, &name, &result);
        };

        if !result.is_success() {
            return self.delegate(id, &name, &result);
        }

        let params = match self.confirmation_params(id, &name) {
            Ok(params) => params,
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    file_id = %id,
                    error = %error,
                    "Cannot build confirmation parameters"
                );

                let mut failed = result;
                failed.set("success", false);
                failed.set("error", error.to_string());
                self.inner.engine.on_complete(id, &name, &failed);
                return CompletionOutcome::Failed;
            }
        };

        let attempt = self.begin(id);
        self.confirm(id, attempt, name, result, endpoint, params).await
    }

    /// Starts a new attempt for `id`, superseding any earlier one.
    fn begin(&self, id: FileId) -> u64 {
        let attempt = self.inner.next_attempt.fetch_add(1, Ordering::Relaxed);
        self.inner.attempts.insert(id, attempt);
        attempt
    }

    fn is_current(&self, id: FileId, attempt: u64) -> bool {
        self.inner
            .attempts
            .get(&id)
            .is_some_and(|current| *current == attempt)
    }

    /// Stores `replay` for manual retry if `attempt` is still live.
    ///
    /// The attempt entry stays borrowed while storing, so a concurrent
    /// removal either sees the stored replay or prevents it.
    fn keep_replay(&self, id: FileId, attempt: u64, replay: &ReplayCallback) -> bool {
        let Some(current) = self.inner.attempts.get(&id) else {
            return false;
        };
        if *current != attempt {
            return false;
        }

        self.inner.retry.store(id, Arc::clone(replay));
        true
    }

    /// Drops the bookkeeping of an attempt that leaves no replay behind.
    fn settle(&self, id: FileId, attempt: u64) {
        self.inner
            .attempts
            .remove_if(&id, |_, current| *current == attempt);
        self.inner.locks.remove(id);
    }

    fn discard(&self, id: FileId, attempt: u64) -> CompletionOutcome {
        tracing::debug!(
            target: TRACING_TARGET,
            file_id = %id,
            attempt,
            "File removed or restarted, dropping confirmation"
        );

        self.inner.locks.remove(id);
        CompletionOutcome::Discarded
    }

    /// Forwards a result to the engine untouched.
    fn delegate(&self, id: FileId, name: &str, result: &UploadResult) -> CompletionOutcome {
        tracing::debug!(
            target: TRACING_TARGET,
            file_id = %id,
            success = result.is_success(),
            "Forwarding storage result without confirmation"
        );

        self.inner.engine.on_complete(id, name, result);
        CompletionOutcome::Delegated
    }

    /// Merges the fixed fields into the stored parameters of `id`.
    fn confirmation_params(&self, id: FileId, name: &str) -> Result<Map<String, Value>> {
        let engine = &self.inner.engine;
        let mut params = self.inner.params.get(id);

        match self.inner.canned.key(id) {
            Some(key) => {
                params.insert("key".to_owned(), Value::String(key));
            }
            None => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    file_id = %id,
                    "No storage key known for file"
                );
            }
        }

        let uuid = engine.uuid(id).ok_or_else(|| {
            Error::invalid_input()
                .with_message("Unknown file")
                .with_context(id.to_string())
        })?;
        params.insert("uuid".to_owned(), Value::String(uuid.to_string()));
        params.insert("name".to_owned(), Value::String(name.to_owned()));

        let bucket = bucket_from_endpoint(&self.inner.endpoints.get(id))?;
        params.insert("bucket".to_owned(), Value::String(bucket));

        Ok(params)
    }

    /// Sends the confirmation of `id` and settles the outcome.
    ///
    /// `original` is the storage-layer result; every attempt merges its
    /// response into a fresh copy of it.
    fn confirm(
        &self,
        id: FileId,
        attempt: u64,
        name: String,
        original: UploadResult,
        endpoint: Url,
        params: Map<String, Value>,
    ) -> BoxFuture<'static, CompletionOutcome> {
        let this = self.clone();

        async move {
            if !this.is_current(id, attempt) {
                return this.discard(id, attempt);
            }

            let response = this.send(id, &endpoint, &params).await;
            if !this.is_current(id, attempt) {
                return this.discard(id, attempt);
            }

            let mut merged = original.clone();
            merged.merge(&response.result_fields());

            if response.is_success() {
                this.inner.retry.remove(id);
                this.inner.params.remove(id);
                this.settle(id, attempt);
                this.inner.engine.on_complete(id, &name, &merged);
                return CompletionOutcome::Confirmed;
            }

            let replay = if response.is_reset() {
                tracing::warn!(
                    target: TRACING_TARGET,
                    file_id = %id,
                    "Server demanded a full re-upload"
                );

                this.inner.retry.remove(id);
                this.settle(id, attempt);
                None
            } else {
                let replay = this.replay(id, attempt, name.clone(), original, endpoint, params);
                if !this.keep_replay(id, attempt, &replay) {
                    return this.discard(id, attempt);
                }

                this.inner.locks.remove(id);
                Some(replay)
            };

            if this.inner.engine.on_auto_retry(id, &name, &merged, replay) {
                return CompletionOutcome::RetryScheduled;
            }

            tracing::warn!(
                target: TRACING_TARGET,
                file_id = %id,
                error = merged.error().unwrap_or_default(),
                "Automatic retry declined, reporting failure"
            );

            this.inner.engine.on_complete(id, &name, &merged);
            CompletionOutcome::Failed
        }
        .boxed()
    }

    /// Builds the action that replays this confirmation request.
    fn replay(
        &self,
        id: FileId,
        attempt: u64,
        name: String,
        original: UploadResult,
        endpoint: Url,
        params: Map<String, Value>,
    ) -> ReplayCallback {
        let this = self.clone();

        Arc::new(move || {
            tracing::debug!(
                target: TRACING_TARGET,
                file_id = %id,
                "Replaying confirmation request"
            );

            this.confirm(
                id,
                attempt,
                name.clone(),
                original.clone(),
                endpoint.clone(),
                params.clone(),
            )
        })
    }

    /// Sends one confirmation request, turning a missing answer into a
    /// failed response.
    async fn send(
        &self,
        id: FileId,
        endpoint: &Url,
        params: &Map<String, Value>,
    ) -> ConfirmationResponse {
        let settings = &self.inner.settings;
        let request = ConfirmationRequest::new(id, endpoint.clone(), params.clone())
            .with_headers(settings.headers.clone())
            .with_cors(settings.cors);

        let started_at = jiff::Timestamp::now();
        let _guard = self.inner.locks.lock(id).await;

        match self.inner.service.confirm(&request).await {
            Ok(response) => response,
            Err(error) => {
                let message = error
                    .message
                    .as_deref()
                    .map(str::to_owned)
                    .unwrap_or_else(|| error.to_string());
                ConfirmationResponse::unanswered(request.request_id, message, started_at)
            }
        }
    }

    /// Forgets `id`. Its in-flight and pending confirmations settle as
    /// [`CompletionOutcome::Discarded`].
    pub(crate) fn forget(&self, id: FileId) {
        self.inner.attempts.remove(&id);
        self.inner.locks.remove(id);
    }

    /// Forgets every file.
    pub(crate) fn forget_all(&self) {
        self.inner.attempts.clear();
        self.inner.locks.cleanup();
    }
}
