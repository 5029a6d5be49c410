//! Completion confirmation with the local server.
//!
//! After an object lands in storage, the local server is asked whether it
//! accepts it. Providers implement the transport; [`ConfirmationService`]
//! wraps any provider with structured logging.

mod request;
mod response;
mod service;

pub use request::{ConfirmationRequest, CorsOptions};
pub use response::ConfirmationResponse;
pub use service::ConfirmationService;

use crate::Result;

/// Tracing target for confirmation operations.
pub const TRACING_TARGET: &str = "cirrus_core::confirmation";

/// Core trait for sending confirmation requests.
///
/// Implementations return `Ok` for every answer the server gave, including
/// rejections, and `Err` only when no answer was obtained.
#[async_trait::async_trait]
pub trait ConfirmationProvider: Send + Sync {
    /// Sends one confirmation request.
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<ConfirmationResponse>;
}
