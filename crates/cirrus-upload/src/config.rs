//! Uploader configuration.
//!
//! ```text
//! UploaderConfig
//! ├── request: RequestConfig                 # upload endpoint, fallback access key
//! ├── credentials: Option<RawCredentials>    # temporary signing credentials
//! ├── object_properties: ObjectProperties    # ACL, key strategy, storage flags
//! ├── signature: SignatureConfig             # signing endpoint, version, headers
//! ├── upload_success: UploadSuccessConfig    # confirmation endpoint and request options
//! ├── iframe_support: IframeSupportConfig    # blank page for iframe uploads
//! └── validation: ValidationConfig           # size bounds enforced by the storage policy
//! ```

use std::collections::HashMap;

use cirrus_core::endpoint::parse_endpoint;
use cirrus_core::{CorsOptions, Error, KeyNameStrategy, RawCredentials, Result};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Default ACL applied to uploaded objects.
pub const DEFAULT_ACL: &str = "private";

/// Default signature version.
pub const DEFAULT_SIGNATURE_VERSION: u8 = 2;

/// Complete configuration of an S3 upload session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
#[must_use = "config does nothing unless you use it"]
pub struct UploaderConfig {
    /// Upload endpoint and fallback access key.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub request: RequestConfig,

    /// Temporary credentials, if the session signs requests itself.
    #[cfg_attr(feature = "config", arg(skip))]
    #[serde(default)]
    pub credentials: Option<RawCredentials>,

    /// Properties applied to every stored object.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub object_properties: ObjectProperties,

    /// Request signing options.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub signature: SignatureConfig,

    /// Completion confirmation options.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub upload_success: UploadSuccessConfig,

    /// Iframe transport options.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub iframe_support: IframeSupportConfig,

    /// Size bounds passed to the storage policy.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Upload endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Bucket endpoint; `http` is assumed when no scheme is given
    #[cfg_attr(feature = "config", arg(long = "endpoint", env = "S3_ENDPOINT", default_value = ""))]
    #[serde(default)]
    pub endpoint: String,

    /// Access key used when no temporary credentials are supplied
    #[cfg_attr(feature = "config", arg(long = "access-key", env = "S3_ACCESS_KEY"))]
    #[serde(default)]
    pub access_key: Option<String>,
}

/// Properties of stored objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct ObjectProperties {
    /// Canned ACL applied to each object
    #[cfg_attr(feature = "config", arg(long = "acl", env = "S3_ACL", default_value = DEFAULT_ACL))]
    #[serde(default = "default_acl")]
    pub acl: String,

    /// How object keys are chosen: `uuid` or `filename`
    #[cfg_attr(
        feature = "config",
        arg(id = "key_name", long = "key-name", env = "S3_KEY_NAME", default_value = "uuid")
    )]
    #[serde(default)]
    pub key: KeyNameStrategy,

    /// Store objects with reduced redundancy
    #[cfg_attr(feature = "config", arg(long = "reduced-redundancy", env = "S3_REDUCED_REDUNDANCY"))]
    #[serde(default)]
    pub reduced_redundancy: bool,

    /// Ask the store to encrypt objects at rest
    #[cfg_attr(
        feature = "config",
        arg(long = "server-side-encryption", env = "S3_SERVER_SIDE_ENCRYPTION")
    )]
    #[serde(default)]
    pub server_side_encryption: bool,
}

fn default_acl() -> String {
    DEFAULT_ACL.to_owned()
}

impl Default for ObjectProperties {
    fn default() -> Self {
        Self {
            acl: default_acl(),
            key: KeyNameStrategy::default(),
            reduced_redundancy: false,
            server_side_encryption: false,
        }
    }
}

/// Request signing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct SignatureConfig {
    /// Local endpoint that signs policy documents and headers
    #[cfg_attr(
        feature = "config",
        arg(id = "signature_endpoint", long = "signature-endpoint", env = "S3_SIGNATURE_ENDPOINT")
    )]
    #[serde(default)]
    pub endpoint: Option<String>,

    /// AWS signature version, 2 or 4
    #[cfg_attr(
        feature = "config",
        arg(
            id = "signature_version",
            long = "signature-version",
            env = "S3_SIGNATURE_VERSION",
            default_value_t = DEFAULT_SIGNATURE_VERSION
        )
    )]
    #[serde(default = "default_signature_version")]
    pub version: u8,

    /// Extra headers sent with signature requests
    #[cfg_attr(feature = "config", arg(skip))]
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
}

fn default_signature_version() -> u8 {
    DEFAULT_SIGNATURE_VERSION
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            version: default_signature_version(),
            custom_headers: HashMap::new(),
        }
    }
}

/// Completion confirmation options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct UploadSuccessConfig {
    /// Local endpoint that confirms stored objects; unset disables confirmation
    #[cfg_attr(
        feature = "config",
        arg(id = "success_endpoint", long = "success-endpoint", env = "UPLOAD_SUCCESS_ENDPOINT")
    )]
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Parameters sent with every confirmation request
    #[cfg_attr(feature = "config", arg(skip))]
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Extra headers sent with confirmation requests
    #[cfg_attr(feature = "config", arg(skip))]
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,

    /// Cross-origin behaviour of confirmation requests
    #[cfg_attr(feature = "config", arg(skip))]
    #[serde(default)]
    pub cors: CorsOptions,
}

impl UploadSuccessConfig {
    /// Returns the parsed confirmation endpoint, if one is configured.
    pub fn endpoint_url(&self) -> Result<Option<Url>> {
        self.endpoint
            .as_deref()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .map(parse_endpoint)
            .transpose()
    }
}

/// Iframe transport options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct IframeSupportConfig {
    /// Same-origin blank page the storage redirects to after an iframe upload
    #[cfg_attr(
        feature = "config",
        arg(long = "local-blank-page-path", env = "S3_LOCAL_BLANK_PAGE_PATH")
    )]
    #[serde(default)]
    pub local_blank_page_path: Option<String>,
}

/// Size bounds in bytes; zero means unbounded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    /// Smallest accepted object size
    #[cfg_attr(
        feature = "config",
        arg(long = "min-size-limit", env = "S3_MIN_SIZE_LIMIT", default_value_t = 0)
    )]
    #[serde(default)]
    pub min_size_limit: u64,

    /// Largest accepted object size
    #[cfg_attr(
        feature = "config",
        arg(long = "size-limit", env = "S3_SIZE_LIMIT", default_value_t = 0)
    )]
    #[serde(default)]
    pub size_limit: u64,
}

impl UploaderConfig {
    /// Creates a configuration for the given upload endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            request: RequestConfig {
                endpoint: endpoint.into(),
                access_key: None,
            },
            ..Self::default()
        }
    }

    /// Sets the fallback access key.
    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.request.access_key = Some(access_key.into());
        self
    }

    /// Sets the initial temporary credentials.
    pub fn with_credentials(mut self, credentials: RawCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the key-name strategy.
    pub fn with_key_name(mut self, strategy: KeyNameStrategy) -> Self {
        self.object_properties.key = strategy;
        self
    }

    /// Enables completion confirmation against `endpoint`.
    pub fn with_success_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.upload_success.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the default confirmation parameters.
    pub fn with_success_params(mut self, params: Map<String, Value>) -> Self {
        self.upload_success.params = params;
        self
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns a [`cirrus_core::ErrorKind::Configuration`] error when:
    /// - the upload endpoint is empty or cannot be parsed
    /// - the signature version is neither 2 nor 4
    /// - the minimum size exceeds the maximum size while both are bounded
    /// - the confirmation endpoint is set but cannot be parsed
    pub fn validate(&self) -> Result<()> {
        parse_endpoint(&self.request.endpoint).map_err(|e| {
            Error::configuration()
                .with_message("Invalid upload endpoint")
                .with_context("request.endpoint")
                .with_source(e)
        })?;

        if !matches!(self.signature.version, 2 | 4) {
            return Err(Error::configuration()
                .with_message(format!(
                    "Signature version {} is invalid. Must be 2 or 4.",
                    self.signature.version
                ))
                .with_context("signature.version"));
        }

        let ValidationConfig {
            min_size_limit,
            size_limit,
        } = self.validation;
        if min_size_limit > 0 && size_limit > 0 && min_size_limit > size_limit {
            return Err(Error::configuration()
                .with_message(format!(
                    "Minimum size {min_size_limit} exceeds maximum size {size_limit}"
                ))
                .with_context("validation"));
        }

        self.upload_success.endpoint_url().map_err(|e| {
            Error::configuration()
                .with_message("Invalid upload success endpoint")
                .with_context("uploadSuccess.endpoint")
                .with_source(e)
        })?;

        Ok(())
    }
}
