#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod file_id;
mod result;
mod session;

pub mod confirmation;
pub mod credentials;
pub mod endpoint;
pub mod engine;
pub mod key_name;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

pub use confirmation::{
    ConfirmationProvider, ConfirmationRequest, ConfirmationResponse, ConfirmationService,
    CorsOptions,
};
pub use credentials::{
    CredentialStore, Credentials, CredentialsProvider, Expiration, ExpiryHook, RawCredentials,
};
pub use engine::{CompletionOutcome, ReplayCallback, UploadEngine};
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use file_id::FileId;
pub use key_name::{KeyNameFn, KeyNameOutput, KeyNameResolver, KeyNameStrategy};
pub use result::{UploadResult, is_truthy};
pub use session::SessionData;
