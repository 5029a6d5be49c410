//! Credential value types.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Expiration as supplied by configuration or an expiry hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expiration {
    /// Already an absolute timestamp.
    At(Timestamp),
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// Milliseconds since the Unix epoch, as a JSON float such as `1.7e12`.
    /// Sub-millisecond digits are dropped.
    FractionalMillis(f64),
    /// Text that still needs to be parsed.
    Text(String),
}

impl Expiration {
    /// Normalizes the expiration into an absolute timestamp.
    pub fn to_timestamp(&self) -> Result<Timestamp> {
        match self {
            Self::At(timestamp) => Ok(*timestamp),
            Self::Millis(millis) => Timestamp::from_millisecond(*millis).map_err(|e| {
                Error::invalid_credentials("expiration").with_source(e)
            }),
            Self::FractionalMillis(millis) if !millis.is_finite() => {
                Err(Error::invalid_credentials("expiration"))
            }
            Self::FractionalMillis(millis) => Timestamp::from_millisecond(millis.trunc() as i64)
                .map_err(|e| Error::invalid_credentials("expiration").with_source(e)),
            Self::Text(text) if text.trim().is_empty() => {
                Err(Error::invalid_credentials("expiration"))
            }
            Self::Text(text) => text
                .trim()
                .parse::<Timestamp>()
                .map_err(|e| Error::invalid_credentials("expiration").with_source(e)),
        }
    }
}

impl From<Timestamp> for Expiration {
    fn from(timestamp: Timestamp) -> Self {
        Self::At(timestamp)
    }
}

/// Credentials exactly as an integrator supplies them, before validation.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCredentials {
    /// Access key id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    /// Secret access key. Its presence is what makes the value "non-empty".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// When the temporary credentials stop being valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<Expiration>,
    /// Session token for temporary credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl RawCredentials {
    /// Creates raw credentials from an access/secret key pair.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
            ..Self::default()
        }
    }

    /// Sets the expiration.
    #[must_use]
    pub fn with_expiration(mut self, expiration: impl Into<Expiration>) -> Self {
        self.expiration = Some(expiration.into());
        self
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }

    /// Returns whether a non-empty secret key is present.
    pub fn has_secret_key(&self) -> bool {
        self.secret_key.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Validates and normalizes into [`Credentials`].
    ///
    /// Requires a non-empty secret key, a non-empty access key and a parseable
    /// expiration. The error names the first missing field.
    pub fn validate(&self) -> Result<Credentials> {
        let secret_key = self
            .secret_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::invalid_credentials("secretKey"))?;
        let access_key = self
            .access_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::invalid_credentials("accessKey"))?;
        let expiration = self
            .expiration
            .as_ref()
            .ok_or_else(|| Error::invalid_credentials("expiration"))?
            .to_timestamp()?;

        Ok(Credentials {
            access_key: access_key.to_owned(),
            secret_key: secret_key.to_owned(),
            expiration,
            session_token: self.session_token.clone().filter(|s| !s.is_empty()),
        })
    }
}

impl fmt::Debug for RawCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCredentials")
            .field("access_key", &self.access_key)
            .field("has_secret_key", &self.has_secret_key())
            .field("expiration", &self.expiration)
            .field("has_session_token", &self.session_token.is_some())
            .finish()
    }
}

/// Validated signing credentials.
///
/// Replaced wholesale on refresh, never mutated in place.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
    expiration: Timestamp,
    session_token: Option<String>,
}

impl Credentials {
    /// Returns the access key.
    #[inline]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Returns the secret key.
    #[inline]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Returns the absolute expiration.
    #[inline]
    pub fn expiration(&self) -> Timestamp {
        self.expiration
    }

    /// Returns the session token if available.
    #[inline]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Returns whether these credentials are expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expiration
    }

    /// Returns a masked version of the access key for logging.
    ///
    /// Keeps the first four characters of keys longer than that.
    pub fn access_key_masked(&self) -> String {
        let len = self.access_key.chars().count();
        if len <= 4 {
            "*".repeat(len)
        } else {
            let prefix: String = self.access_key.chars().take(4).collect();
            format!("{prefix}***")
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key_masked())
            .field("expiration", &self.expiration)
            .field("has_session_token", &self.session_token.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_validate_normalizes_text_expiration() {
        let raw = RawCredentials::new("AKIATEST12345", "secret")
            .with_expiration(Expiration::Text("2030-01-01T00:00:00Z".into()))
            .with_session_token("token");

        let creds = raw.validate().unwrap();
        assert_eq!(creds.access_key(), "AKIATEST12345");
        assert_eq!(creds.secret_key(), "secret");
        assert_eq!(creds.session_token(), Some("token"));
        assert_eq!(
            creds.expiration(),
            "2030-01-01T00:00:00Z".parse::<Timestamp>().unwrap()
        );
    }

    #[test]
    fn test_validate_accepts_epoch_millis() {
        let raw = RawCredentials::new("access", "secret").with_expiration(Expiration::Millis(0));
        let creds = raw.validate().unwrap();
        assert_eq!(creds.expiration(), Timestamp::UNIX_EPOCH);
    }

    #[test]
    fn test_validate_missing_access_key() {
        let raw = RawCredentials {
            secret_key: Some("secret".into()),
            expiration: Some(Timestamp::now().into()),
            ..Default::default()
        };
        let error = raw.validate().unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidCredentials);
        assert_eq!(error.context.as_deref(), Some("accessKey"));
    }

    #[test]
    fn test_validate_missing_expiration() {
        let error = RawCredentials::new("access", "secret")
            .validate()
            .unwrap_err();
        assert_eq!(error.context.as_deref(), Some("expiration"));
    }

    #[test]
    fn test_validate_unparseable_expiration() {
        let error = RawCredentials::new("access", "secret")
            .with_expiration(Expiration::Text("next tuesday".into()))
            .validate()
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidCredentials);
        assert_eq!(error.context.as_deref(), Some("expiration"));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let raw: RawCredentials = serde_json::from_str(
            r#"{"accessKey":"a","secretKey":"s","expiration":"2030-01-01T00:00:00Z","sessionToken":"t"}"#,
        )
        .unwrap();
        assert!(raw.has_secret_key());
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_is_expired_at() {
        let expiration: Timestamp = "2030-01-01T00:00:00Z".parse().unwrap();
        let creds = RawCredentials::new("a", "s")
            .with_expiration(expiration)
            .validate()
            .unwrap();
        assert!(!creds.is_expired_at("2029-12-31T23:59:59Z".parse().unwrap()));
        assert!(creds.is_expired_at(expiration));
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = RawCredentials::new("AKIATEST12345", "super-secret")
            .with_expiration(Timestamp::UNIX_EPOCH)
            .validate()
            .unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKIA***"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_masking_counts_characters() {
        let short = RawCredentials::new("aéé", "secret")
            .with_expiration(Timestamp::UNIX_EPOCH)
            .validate()
            .unwrap();
        assert_eq!(short.access_key_masked(), "***");
        assert!(format!("{short:?}").contains("***"));

        let long = RawCredentials::new("ééééé-key", "secret")
            .with_expiration(Timestamp::UNIX_EPOCH)
            .validate()
            .unwrap();
        assert_eq!(long.access_key_masked(), "éééé***");
    }

    #[test]
    fn test_deserialize_float_millis_expiration() {
        let raw: RawCredentials = serde_json::from_str(
            r#"{"accessKey":"a","secretKey":"s","expiration":1.7e12}"#,
        )
        .unwrap();
        assert_eq!(raw.expiration, Some(Expiration::FractionalMillis(1.7e12)));

        let creds = raw.validate().unwrap();
        assert_eq!(
            creds.expiration(),
            Timestamp::from_millisecond(1_700_000_000_000).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_float_millis_is_invalid() {
        let error = RawCredentials::new("a", "s")
            .with_expiration(Expiration::FractionalMillis(1e30))
            .validate()
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidCredentials);
        assert_eq!(error.context.as_deref(), Some("expiration"));
    }
}
