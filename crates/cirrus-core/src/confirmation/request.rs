//! Confirmation request types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use crate::FileId;

/// Cross-origin behaviour of the confirmation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsOptions {
    /// The endpoint lives on another origin.
    #[serde(default)]
    pub expected: bool,
    /// Send credential-bearing headers (`Cookie`, `Authorization`) with a
    /// cross-origin request. Ignored for same-origin requests.
    #[serde(default)]
    pub send_credentials: bool,
}

/// A request asking the local server to confirm a stored object.
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// The file being confirmed.
    pub file_id: FileId,
    /// The confirmation endpoint.
    pub url: Url,
    /// Body parameters: `key`, `uuid`, `name`, `bucket` plus integrator params.
    pub params: Map<String, Value>,
    /// Custom headers to include in the request.
    pub headers: HashMap<String, String>,
    /// Cross-origin behaviour.
    pub cors: CorsOptions,
}

impl ConfirmationRequest {
    /// Creates a new confirmation request.
    pub fn new(file_id: FileId, url: Url, params: Map<String, Value>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            file_id,
            url,
            params,
            headers: HashMap::new(),
            cors: CorsOptions::default(),
        }
    }

    /// Adds a custom header to the request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets multiple custom headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the cross-origin behaviour.
    #[must_use]
    pub fn with_cors(mut self, cors: CorsOptions) -> Self {
        self.cors = cors;
        self
    }

    /// Returns a body parameter as a string, if set to one.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }
}
