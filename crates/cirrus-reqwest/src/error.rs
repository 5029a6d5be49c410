//! Confirmation delivery errors.

use reqwest::header::{InvalidHeaderName, InvalidHeaderValue};
use thiserror::Error;

/// Result type alias for confirmation delivery.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a confirmation request could not be delivered or answered.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP client could not be created.
    #[error("Cannot create confirmation client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request went out but no answer came back.
    #[error("Confirmation request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The confirmation parameters could not be encoded as JSON.
    #[error("Cannot encode confirmation parameters: {0}")]
    Encode(#[from] serde_json::Error),

    /// A custom header has a name HTTP does not allow.
    #[error("Invalid confirmation header name '{name}'")]
    HeaderName {
        name: String,
        #[source]
        source: InvalidHeaderName,
    },

    /// A custom header has a value HTTP does not allow.
    #[error("Invalid value for confirmation header '{name}'")]
    HeaderValue {
        name: String,
        #[source]
        source: InvalidHeaderValue,
    },
}

impl From<Error> for cirrus_core::Error {
    fn from(err: Error) -> Self {
        use cirrus_core::Error as CoreError;

        let message = err.to_string();
        match err {
            Error::Client(e) => CoreError::configuration().with_message(message).with_source(e),
            Error::Request(e) if e.is_timeout() => CoreError::timeout()
                .with_message("Confirmation request timed out")
                .with_source(e),
            Error::Request(e) if e.is_connect() => CoreError::network_error()
                .with_message("Cannot reach the confirmation endpoint")
                .with_source(e),
            Error::Request(e) => CoreError::confirmation().with_message(message).with_source(e),
            Error::Encode(e) => CoreError::serialization().with_message(message).with_source(e),
            Error::HeaderName { name, source } => CoreError::invalid_input()
                .with_message(message)
                .with_context(name)
                .with_source(source),
            Error::HeaderValue { name, source } => CoreError::invalid_input()
                .with_message(message)
                .with_context(name)
                .with_source(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use cirrus_core::ErrorKind;
    use reqwest::header::HeaderName;

    use super::*;

    #[test]
    fn test_invalid_header_is_not_retryable() {
        let source = HeaderName::from_bytes(b"bad header").unwrap_err();
        let error = cirrus_core::Error::from(Error::HeaderName {
            name: "bad header".to_owned(),
            source,
        });

        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert_eq!(error.context.as_deref(), Some("bad header"));
        assert!(!error.kind.is_retryable());
    }

    #[test]
    fn test_encode_error_maps_to_serialization() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = cirrus_core::Error::from(Error::Encode(source));

        assert_eq!(error.kind, ErrorKind::Serialization);
        assert!(error.message.as_deref().unwrap_or_default().contains("encode"));
    }
}
