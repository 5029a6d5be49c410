//! Confirmation client configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Seconds to wait for the confirmation server before giving up.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 30;

/// `X-Requested-With` value marking same-origin confirmations as AJAX calls.
pub const DEFAULT_REQUESTED_WITH: &str = "XMLHttpRequest";

/// How confirmation requests are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct ReqwestConfig {
    /// Seconds to wait for the confirmation server; 0 uses the default
    #[cfg_attr(
        feature = "config",
        arg(
            long = "confirmation-timeout",
            env = "CONFIRMATION_TIMEOUT",
            default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_SECS
        )
    )]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// `X-Requested-With` value sent on same-origin confirmations; empty omits it
    #[cfg_attr(
        feature = "config",
        arg(
            long = "confirmation-requested-with",
            env = "CONFIRMATION_REQUESTED_WITH",
            default_value = DEFAULT_REQUESTED_WITH
        )
    )]
    #[serde(default = "default_requested_with")]
    pub requested_with: String,

    /// User-Agent sent with confirmations (defaults to `cirrus/<version>`)
    #[cfg_attr(
        feature = "config",
        arg(long = "confirmation-user-agent", env = "CONFIRMATION_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_requested_with() -> String {
    DEFAULT_REQUESTED_WITH.to_owned()
}

impl Default for ReqwestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            requested_with: default_requested_with(),
            user_agent: None,
        }
    }
}

impl ReqwestConfig {
    /// How long one confirmation may take.
    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            0 => Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// The AJAX marker for same-origin requests, if one is sent at all.
    pub fn requested_with(&self) -> Option<&str> {
        Some(self.requested_with.trim()).filter(|value| !value.is_empty())
    }

    /// The User-Agent header value.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .as_deref()
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map_or_else(
                || format!("cirrus/{}", env!("CARGO_PKG_VERSION")),
                str::to_owned,
            )
    }

    /// Sets the confirmation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the AJAX marker; an empty value omits the header.
    #[must_use]
    pub fn with_requested_with(mut self, value: impl Into<String>) -> Self {
        self.requested_with = value.into();
        self
    }

    /// Sets the User-Agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
