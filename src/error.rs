//! Error types for verification and transport.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::{self, ErrorCode};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Verification could not be attempted or completed.
///
/// This is distinct from an unsuccessful [`VerificationResult`](crate::VerificationResult):
/// a rejected token is a normal outcome, a `VerificationFailure` means the
/// verifier is misconfigured or Cloudflare could not be reached.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct VerificationFailure {
    message: String,
    error_codes: Vec<String>,
    #[source]
    source: Option<BoxError>,
}

impl VerificationFailure {
    pub fn new(message: impl Into<String>, error_codes: Vec<String>) -> Self {
        Self {
            message: message.into(),
            error_codes,
            source: None,
        }
    }

    /// Failure carrying a single catalog code
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(message, vec![code.into()])
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_codes(&self) -> &[String] {
        &self.error_codes
    }

    pub fn first_error_code(&self) -> Option<&str> {
        self.error_codes.first().map(String::as_str)
    }

    pub fn has_error_code(&self, code: &str) -> bool {
        self.error_codes.iter().any(|c| c == code)
    }

    /// Catalog descriptions for the carried codes
    pub fn error_messages(&self) -> Vec<&'static str> {
        catalog::describe_all(&self.error_codes)
    }
}

/// Network-level problem talking to the verification endpoint
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    pub(crate) fn from_reqwest(url: &str, timeout: Duration, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            Self::Http {
                url: url.to_string(),
                source,
            }
        }
    }
}
