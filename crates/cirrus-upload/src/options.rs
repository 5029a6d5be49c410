//! Options handed down to the signing transport.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cirrus_core::CredentialsProvider;
use url::Url;

use crate::config::ObjectProperties;

/// Request signing options as the transport consumes them.
#[derive(Clone)]
pub struct SignatureOptions {
    /// Local signing endpoint, if requests are signed server-side.
    pub endpoint: Option<String>,
    /// AWS signature version.
    pub version: u8,
    /// Extra headers for signature requests.
    pub custom_headers: HashMap<String, String>,
    /// Source of the active credentials, notified when they expire.
    pub credentials_provider: Arc<dyn CredentialsProvider>,
}

impl fmt::Debug for SignatureOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureOptions")
            .field("endpoint", &self.endpoint)
            .field("version", &self.version)
            .field("custom_headers", &self.custom_headers)
            .finish_non_exhaustive()
    }
}

/// Everything the transport needs beyond the file bytes.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Upload endpoint.
    pub endpoint: Url,
    /// Access key of the active credentials, or the configured fallback.
    pub access_key: Option<String>,
    /// Properties applied to each stored object.
    pub object_properties: ObjectProperties,
    /// Signing options.
    pub signature: SignatureOptions,
    /// Blank page the storage redirects iframe uploads to.
    pub local_blank_page_path: Option<String>,
    /// Smallest accepted object size in bytes, 0 when unbounded.
    pub min_size_limit: u64,
    /// Largest accepted object size in bytes, 0 when unbounded.
    pub size_limit: u64,
}
