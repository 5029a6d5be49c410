//! Confirmation service wrapper with observability.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::{ConfirmationProvider, ConfirmationRequest, ConfirmationResponse, TRACING_TARGET};
use crate::Result;

/// Confirmation service wrapper with observability.
///
/// This wrapper adds structured logging to any confirmation provider.
/// The inner provider is wrapped in `Arc` for cheap cloning.
#[derive(Clone)]
pub struct ConfirmationService {
    inner: Arc<dyn ConfirmationProvider>,
}

impl fmt::Debug for ConfirmationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationService").finish_non_exhaustive()
    }
}

impl ConfirmationService {
    /// Create a new confirmation service wrapper.
    pub fn new<P>(provider: P) -> Self
    where
        P: ConfirmationProvider + 'static,
    {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Sends a confirmation request.
    pub async fn confirm(&self, request: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        let started_at = Instant::now();

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            file_id = %request.file_id,
            url = %request.url,
            cors = request.cors.expected,
            "Sending confirmation request"
        );

        let result = self.inner.confirm(request).await;
        let elapsed = started_at.elapsed();

        match &result {
            Ok(response) if response.is_success() => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    request_id = %request.request_id,
                    file_id = %request.file_id,
                    status_code = response.status_code,
                    elapsed_ms = elapsed.as_millis(),
                    "Upload success was acknowledged by the server"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    request_id = %request.request_id,
                    file_id = %request.file_id,
                    status_code = response.status_code,
                    reset = response.is_reset(),
                    elapsed_ms = elapsed.as_millis(),
                    "Upload success request was rejected by the server"
                );
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    request_id = %request.request_id,
                    file_id = %request.file_id,
                    error = %error,
                    elapsed_ms = elapsed.as_millis(),
                    "Confirmation request error"
                );
            }
        }

        result
    }
}
