#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod client;
mod config;
mod error;

pub use client::ReqwestClient;
pub use config::{DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_REQUESTED_WITH, ReqwestConfig};
pub use error::{Error, Result};

/// Tracing target for reqwest client operations.
pub const TRACING_TARGET: &str = "cirrus_reqwest";
