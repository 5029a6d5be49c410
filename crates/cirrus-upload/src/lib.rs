#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod keyed_mutex;
mod manager;
mod options;

pub mod canned;
pub mod completion;
pub mod config;
pub mod params;
pub mod retry;

pub use canned::CannedFileRegistry;
pub use completion::{CompletionCoordinator, ConfirmationSettings};
pub use config::{
    IframeSupportConfig, ObjectProperties, RequestConfig, SignatureConfig, UploadSuccessConfig,
    UploaderConfig, ValidationConfig,
};
pub use manager::{S3UploadManager, S3UploadManagerBuilder};
pub use options::{SignatureOptions, TransportOptions};
pub use params::{EndpointStore, PerFileStore, UploadSuccessParamsStore};
pub use retry::RetryCoordinator;

/// Tracing target for session-level operations.
pub const TRACING_TARGET: &str = "cirrus_upload";
