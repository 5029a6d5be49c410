//! Confirmation response types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::result::is_truthy;

/// Answer to a confirmation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    /// Unique identifier for this response.
    pub response_id: Uuid,
    /// Request ID this response corresponds to.
    pub request_id: Uuid,
    /// HTTP status code (0 if the request failed before a response).
    pub status_code: u16,
    /// Parsed JSON body; empty when the body was not a JSON object.
    pub body: Map<String, Value>,
    /// Timestamp when the request was initiated.
    pub started_at: Timestamp,
    /// Timestamp when the response was received.
    pub finished_at: Timestamp,
}

impl ConfirmationResponse {
    /// Creates a new confirmation response.
    pub fn new(
        request_id: Uuid,
        status_code: u16,
        body: Map<String, Value>,
        started_at: Timestamp,
    ) -> Self {
        Self {
            response_id: Uuid::now_v7(),
            request_id,
            status_code,
            body,
            started_at,
            finished_at: Timestamp::now(),
        }
    }

    /// Creates a response for a request that never got an answer.
    pub fn unanswered(request_id: Uuid, error: impl Into<String>, started_at: Timestamp) -> Self {
        let mut body = Map::new();
        body.insert("error".to_owned(), Value::String(error.into()));
        Self::new(request_id, 0, body, started_at)
    }

    /// Parses a raw response body, keeping it only if it is a JSON object.
    pub fn parse_body(bytes: &[u8]) -> Map<String, Value> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Returns whether the server accepted the object.
    ///
    /// Requires a 2xx status, a truthy `success` and no `error` field.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
            && self.body.get("success").is_some_and(is_truthy)
            && self.body.get("error").is_none_or(|e| !is_truthy(e))
    }

    /// Returns whether the server demanded a full re-upload.
    pub fn is_reset(&self) -> bool {
        self.body
            .get("reset")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns the fields to merge into the upload result.
    ///
    /// The body, with `success` forced to the evaluated outcome.
    pub fn result_fields(&self) -> Map<String, Value> {
        let mut fields = self.body.clone();
        fields.insert("success".to_owned(), Value::Bool(self.is_success()));
        fields
    }
}
