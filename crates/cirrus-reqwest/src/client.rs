//! Reqwest-based HTTP client for completion confirmation.

use std::sync::Arc;

use cirrus_core::{
    ConfirmationProvider, ConfirmationRequest, ConfirmationResponse, ConfirmationService,
};
use jiff::Timestamp;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::{Client, RequestBuilder};

use crate::{Error, ReqwestConfig, Result, TRACING_TARGET};

const REQUESTED_WITH: &str = "x-requested-with";

/// Inner client that holds the HTTP client and configuration.
struct ReqwestClientInner {
    http: Client,
    config: ReqwestConfig,
}

/// Reqwest-based HTTP client that asks the local server to confirm uploads.
///
/// # Examples
///
/// ```rust,ignore
/// use cirrus_reqwest::{ReqwestClient, ReqwestConfig};
/// use cirrus_core::ConfirmationRequest;
///
/// let client = ReqwestClient::new(ReqwestConfig::default())?;
/// let request = ConfirmationRequest::new(id, url, params);
/// let response = client.confirm(&request).await?;
/// ```
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<ReqwestClientInner>,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestClient {
    /// Creates a new reqwest client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ReqwestConfig) -> Result<Self> {
        let timeout = config.timeout();
        let user_agent = config.user_agent();

        tracing::debug!(
            target: TRACING_TARGET,
            timeout_ms = timeout.as_millis(),
            user_agent = %user_agent,
            requested_with = config.requested_with(),
            "Creating confirmation client"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()
            .map_err(Error::Client)?;

        let inner = ReqwestClientInner { http, config };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Creates a new client with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ReqwestConfig::default())
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    /// Converts this client into a [`ConfirmationService`] for use with dependency injection.
    pub fn into_service(self) -> ConfirmationService {
        ConfirmationService::new(self)
    }

    /// Builds the HTTP request for a confirmation.
    fn build(&self, request: &ConfirmationRequest) -> Result<RequestBuilder> {
        let body = serde_json::to_vec(&request.params)?;
        let headers = self.headers(request)?;

        Ok(self
            .inner
            .http
            .post(request.url.as_str())
            .headers(headers)
            .body(body))
    }

    /// Collects the headers of a confirmation.
    ///
    /// Cross-origin requests drop `Cookie` and `Authorization` unless the
    /// request allows sending credentials.
    fn headers(&self, request: &ConfirmationRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if !request.cors.expected
            && let Some(marker) = self.config().requested_with()
        {
            let value = HeaderValue::from_str(marker).map_err(|source| Error::HeaderValue {
                name: REQUESTED_WITH.to_owned(),
                source,
            })?;
            headers.insert(REQUESTED_WITH, value);
        }

        let withhold_credentials = request.cors.expected && !request.cors.send_credentials;
        for (name, value) in &request.headers {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
                Error::HeaderName {
                    name: name.clone(),
                    source,
                }
            })?;

            if withhold_credentials && (header == COOKIE || header == AUTHORIZATION) {
                tracing::debug!(
                    target: TRACING_TARGET,
                    request_id = %request.request_id,
                    header = %header,
                    "Withholding credentials from cross-origin confirmation"
                );
                continue;
            }

            let value = HeaderValue::from_str(value).map_err(|source| Error::HeaderValue {
                name: name.clone(),
                source,
            })?;
            headers.insert(header, value);
        }

        Ok(headers)
    }
}

#[async_trait::async_trait]
impl ConfirmationProvider for ReqwestClient {
    async fn confirm(
        &self,
        request: &ConfirmationRequest,
    ) -> cirrus_core::Result<ConfirmationResponse> {
        let started_at = Timestamp::now();
        let http_request = self.build(request)?;

        let http_response = http_request.send().await.map_err(|e| {
            tracing::warn!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                file_id = %request.file_id,
                error = %e,
                "Confirmation request could not be delivered"
            );
            Error::from(e)
        })?;

        let status_code = http_response.status().as_u16();
        let body = match http_response.bytes().await {
            Ok(bytes) => ConfirmationResponse::parse_body(&bytes),
            Err(e) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    request_id = %request.request_id,
                    error = %e,
                    "Failed to read confirmation response body"
                );
                Default::default()
            }
        };

        let response =
            ConfirmationResponse::new(request.request_id, status_code, body, started_at);

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            file_id = %request.file_id,
            status_code,
            success = response.is_success(),
            "Confirmation response received"
        );

        Ok(response)
    }
}
