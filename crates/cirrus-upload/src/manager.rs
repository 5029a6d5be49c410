//! The per-session upload manager.

use std::sync::Arc;

use cirrus_core::endpoint::{bucket_from_endpoint, parse_endpoint};
use cirrus_core::{
    CompletionOutcome, ConfirmationService, CredentialStore, CredentialsProvider, Error,
    ExpiryHook, FileId, KeyNameResolver, KeyNameStrategy, RawCredentials, Result, SessionData,
    UploadEngine, UploadResult,
};
use serde_json::{Map, Value};

use crate::TRACING_TARGET;
use crate::canned::CannedFileRegistry;
use crate::completion::{CompletionCoordinator, ConfirmationSettings};
use crate::config::UploaderConfig;
use crate::options::{SignatureOptions, TransportOptions};
use crate::params::{EndpointStore, UploadSuccessParamsStore};
use crate::retry::RetryCoordinator;

/// Builder for [`S3UploadManager`].
#[must_use = "builders do nothing unless you call build"]
pub struct S3UploadManagerBuilder {
    config: UploaderConfig,
    engine: Arc<dyn UploadEngine>,
    confirmation: ConfirmationService,
    on_credentials_expired: Option<ExpiryHook>,
}

impl S3UploadManagerBuilder {
    /// Installs the hook run when the transport reports expired credentials.
    pub fn on_credentials_expired(mut self, hook: ExpiryHook) -> Self {
        self.on_credentials_expired = Some(hook);
        self
    }

    /// Overrides the configured key-name strategy, typically with an
    /// integrator function.
    pub fn key_name(mut self, strategy: KeyNameStrategy) -> Self {
        self.config.object_properties.key = strategy;
        self
    }

    /// Validates the configuration and creates the manager.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or the initial credentials
    /// carry a secret key without an access key or expiration.
    pub fn build(self) -> Result<S3UploadManager> {
        let Self {
            config,
            engine,
            confirmation,
            on_credentials_expired,
        } = self;

        config.validate()?;

        let credentials = CredentialStore::new(on_credentials_expired);
        let initial = config.credentials.clone().unwrap_or_default();
        credentials.set_credentials(&initial, true)?;

        let settings = ConfirmationSettings {
            endpoint: config.upload_success.endpoint_url()?,
            headers: config.upload_success.custom_headers.clone(),
            cors: config.upload_success.cors,
        };

        let params = Arc::new(UploadSuccessParamsStore::new(
            config.upload_success.params.clone(),
        ));
        let endpoints = Arc::new(EndpointStore::new(config.request.endpoint.clone()));
        let canned = Arc::new(CannedFileRegistry::new(Arc::clone(&engine)));
        let retry = Arc::new(RetryCoordinator::new(Arc::clone(&engine)));
        let completion = CompletionCoordinator::new(
            Arc::clone(&engine),
            confirmation,
            settings,
            Arc::clone(&params),
            Arc::clone(&endpoints),
            Arc::clone(&canned),
            Arc::clone(&retry),
        );

        tracing::info!(
            target: TRACING_TARGET,
            endpoint = %config.request.endpoint,
            key_name = config.object_properties.key.as_str(),
            confirmation = completion.settings().endpoint.is_some(),
            temporary_credentials = credentials.active().is_some(),
            "Upload manager created"
        );

        Ok(S3UploadManager {
            key_names: KeyNameResolver::new(config.object_properties.key.clone()),
            config,
            engine,
            credentials,
            canned,
            params,
            endpoints,
            retry,
            completion,
        })
    }
}

/// Everything object-storage specific about one upload session.
///
/// Owns the session's credentials and per-file state, and plugs into the
/// generic engine through [`UploadEngine`].
pub struct S3UploadManager {
    config: UploaderConfig,
    engine: Arc<dyn UploadEngine>,
    credentials: CredentialStore,
    key_names: KeyNameResolver,
    canned: Arc<CannedFileRegistry>,
    params: Arc<UploadSuccessParamsStore>,
    endpoints: Arc<EndpointStore>,
    retry: Arc<RetryCoordinator>,
    completion: CompletionCoordinator,
}

impl std::fmt::Debug for S3UploadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3UploadManager")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .field("pending_retries", &self.retry.pending_count())
            .finish_non_exhaustive()
    }
}

impl S3UploadManager {
    /// Starts building a manager.
    pub fn builder(
        config: UploaderConfig,
        engine: Arc<dyn UploadEngine>,
        confirmation: ConfirmationService,
    ) -> S3UploadManagerBuilder {
        S3UploadManagerBuilder {
            config,
            engine,
            confirmation,
            on_credentials_expired: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Replaces the active credentials.
    ///
    /// # Errors
    ///
    /// Fails with [`cirrus_core::ErrorKind::InvalidCredentials`] when `raw` is
    /// empty or misses its access key or expiration.
    pub fn set_credentials(&self, raw: &RawCredentials) -> Result<()> {
        self.credentials.set_credentials(raw, false).map(|_| ())
    }

    /// Returns the credentials provider injected into the transport.
    pub fn credentials_provider(&self) -> Arc<dyn CredentialsProvider> {
        Arc::new(self.credentials.clone())
    }

    /// Returns the access key requests are signed with.
    pub fn access_key(&self) -> Option<String> {
        self.credentials
            .active()
            .map(|credentials| credentials.access_key().to_owned())
            .or_else(|| self.config.request.access_key.clone())
    }

    /// Returns the storage key of `id`.
    pub fn get_key(&self, id: FileId) -> Option<String> {
        self.canned.key(id)
    }

    /// Restores a file from a previous session.
    ///
    /// # Errors
    ///
    /// Fails with [`cirrus_core::ErrorKind::MissingSessionKey`] before any
    /// file is created when `session` has no storage key.
    pub fn add_canned_file(&self, session: &SessionData) -> Result<FileId> {
        self.canned.add(session)
    }

    /// Sets the confirmation parameters of `id`, or the defaults when `id` is
    /// `None`.
    pub fn set_upload_success_params(&self, params: Map<String, Value>, id: Option<FileId>) {
        self.params.set(params, id);
    }

    /// Returns the confirmation parameters of `id`.
    pub fn upload_success_params(&self, id: FileId) -> Map<String, Value> {
        self.params.get(id)
    }

    /// Sets the upload endpoint of `id`, or the default when `id` is `None`.
    ///
    /// # Errors
    ///
    /// Fails with [`cirrus_core::ErrorKind::InvalidInput`] when `endpoint`
    /// cannot be parsed.
    pub fn set_endpoint(&self, endpoint: impl Into<String>, id: Option<FileId>) -> Result<()> {
        let endpoint = endpoint.into();
        parse_endpoint(&endpoint)?;
        self.endpoints.set(endpoint, id);
        Ok(())
    }

    /// Returns the upload endpoint of `id`.
    pub fn endpoint(&self, id: FileId) -> String {
        self.endpoints.get(id)
    }

    /// Returns the bucket `id` is stored in.
    pub fn bucket(&self, id: FileId) -> Result<String> {
        bucket_from_endpoint(&self.endpoints.get(id))
    }

    /// Computes the storage key of `id` from the key-name strategy.
    ///
    /// # Errors
    ///
    /// Fails with [`cirrus_core::ErrorKind::InvalidInput`] for a file the
    /// engine does not know, and with
    /// [`cirrus_core::ErrorKind::KeyResolution`] when the integrator function
    /// produces no key.
    pub async fn resolve_key_name(&self, id: FileId) -> Result<String> {
        let (Some(uuid), Some(name)) = (self.engine.uuid(id), self.engine.name(id)) else {
            return Err(Error::invalid_input()
                .with_message("Unknown file")
                .with_context(id.to_string()));
        };

        self.key_names.resolve(id, uuid, &name).await
    }

    /// Handles the storage-layer result of `id`.
    pub async fn on_upload_complete(&self, id: FileId, result: UploadResult) -> CompletionOutcome {
        self.completion.on_complete(id, result).await
    }

    /// Retries `id` manually, replaying its confirmation when possible.
    pub fn retry(&self, id: FileId) -> bool {
        self.retry.retry(id)
    }

    /// Returns whether `id` has a confirmation waiting to be replayed.
    pub fn has_pending_retry(&self, id: FileId) -> bool {
        self.retry.has_pending(id)
    }

    /// Returns the parameters of the delete request for `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`cirrus_core::ErrorKind::InvalidInput`] when no storage key
    /// is known for `id`.
    pub fn delete_params(&self, id: FileId) -> Result<Map<String, Value>> {
        let key = self.get_key(id).ok_or_else(|| {
            Error::invalid_input()
                .with_message("No storage key known for file")
                .with_context(id.to_string())
        })?;

        let mut params = Map::new();
        params.insert("key".to_owned(), Value::String(key));
        params.insert("bucket".to_owned(), Value::String(self.bucket(id)?));
        Ok(params)
    }

    /// Drops the per-file state of a removed file.
    ///
    /// A confirmation still in flight for `id` settles as
    /// [`CompletionOutcome::Discarded`] and leaves no replay behind.
    pub fn on_file_removed(&self, id: FileId) {
        self.completion.forget(id);
        let had_replay = self.retry.remove(id);
        self.params.remove(id);
        self.endpoints.remove(id);

        tracing::debug!(
            target: TRACING_TARGET,
            file_id = %id,
            had_replay,
            "File state dropped"
        );
    }

    /// Clears every per-file value and restores the configured defaults.
    pub fn reset(&self) {
        self.completion.forget_all();
        self.retry.clear();
        self.params.reset();
        self.endpoints.reset();
        self.canned.clear();

        tracing::debug!(target: TRACING_TARGET, "Upload session reset");
    }

    /// Builds the options handed down to the signing transport.
    ///
    /// # Errors
    ///
    /// Fails when the default upload endpoint cannot be parsed.
    pub fn transport_options(&self) -> Result<TransportOptions> {
        let signature = &self.config.signature;

        Ok(TransportOptions {
            endpoint: parse_endpoint(&self.endpoints.default_value())?,
            access_key: self.access_key(),
            object_properties: self.config.object_properties.clone(),
            signature: SignatureOptions {
                endpoint: signature.endpoint.clone(),
                version: signature.version,
                custom_headers: signature.custom_headers.clone(),
                credentials_provider: self.credentials_provider(),
            },
            local_blank_page_path: self.config.iframe_support.local_blank_page_path.clone(),
            min_size_limit: self.config.validation.min_size_limit,
            size_limit: self.config.validation.size_limit,
        })
    }
}
