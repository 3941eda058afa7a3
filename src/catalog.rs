//! Human-readable descriptions for Turnstile error codes.
//!
//! Cloudflare reports failures as machine-readable codes in the `error-codes`
//! array. This crate adds a few codes of its own for conditions detected
//! locally (disabled service, missing secret, transport problems).

use std::fmt;

/// Description returned for any code not in the catalog
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Error codes known to the catalog
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingInputSecret,
    InvalidInputSecret,
    MissingInputResponse,
    InvalidInputResponse,
    BadRequest,
    TimeoutOrDuplicate,
    InternalError,
    ServiceDisabled,
    MissingSecretKey,
    NetworkError,
    InvalidResponse,
    InvalidHostname,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 12] = [
        ErrorCode::MissingInputSecret,
        ErrorCode::InvalidInputSecret,
        ErrorCode::MissingInputResponse,
        ErrorCode::InvalidInputResponse,
        ErrorCode::BadRequest,
        ErrorCode::TimeoutOrDuplicate,
        ErrorCode::InternalError,
        ErrorCode::ServiceDisabled,
        ErrorCode::MissingSecretKey,
        ErrorCode::NetworkError,
        ErrorCode::InvalidResponse,
        ErrorCode::InvalidHostname,
    ];

    /// The wire form of the code, e.g. `"invalid-input-response"`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingInputSecret => "missing-input-secret",
            Self::InvalidInputSecret => "invalid-input-secret",
            Self::MissingInputResponse => "missing-input-response",
            Self::InvalidInputResponse => "invalid-input-response",
            Self::BadRequest => "bad-request",
            Self::TimeoutOrDuplicate => "timeout-or-duplicate",
            Self::InternalError => "internal-error",
            Self::ServiceDisabled => "service-disabled",
            Self::MissingSecretKey => "missing-secret-key",
            Self::NetworkError => "network-error",
            Self::InvalidResponse => "invalid-response",
            Self::InvalidHostname => "invalid-hostname",
        }
    }

    /// Look up a code by its wire form
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.as_str() == code)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::MissingInputSecret => "The secret parameter was not passed",
            Self::InvalidInputSecret => "The secret parameter was invalid or did not exist",
            Self::MissingInputResponse => "The response parameter (token) was not passed",
            Self::InvalidInputResponse => "The response parameter (token) is invalid or has expired",
            Self::BadRequest => "The request was rejected because it was malformed",
            Self::TimeoutOrDuplicate => "The token has expired or was already validated",
            Self::InternalError => "An internal error happened while validating the response",
            Self::ServiceDisabled => "Turnstile verification is disabled",
            Self::MissingSecretKey => "No Turnstile secret key is configured",
            Self::NetworkError => "The verification request could not be completed",
            Self::InvalidResponse => "The verification service returned a malformed response",
            Self::InvalidHostname => "The token was issued for a hostname that is not allowed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

/// Describe a single error code. Unknown codes map to [`UNKNOWN_ERROR`].
pub fn describe(code: &str) -> &'static str {
    ErrorCode::from_code(code)
        .map(ErrorCode::description)
        .unwrap_or(UNKNOWN_ERROR)
}

/// Describe every code in order, keeping duplicates
pub fn describe_all<I, S>(codes: I) -> Vec<&'static str>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    codes.into_iter().map(|code| describe(code.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_codes() {
        assert_eq!(
            describe("missing-input-secret"),
            "The secret parameter was not passed"
        );
        assert_eq!(
            describe("invalid-input-secret"),
            "The secret parameter was invalid or did not exist"
        );
        assert_eq!(
            describe("service-disabled"),
            "Turnstile verification is disabled"
        );
    }

    #[test]
    fn test_unknown_codes_fall_back() {
        for code in ["unknown-error", "", "Missing-Input-Secret", "network error"] {
            assert_eq!(describe(code), UNKNOWN_ERROR);
        }
    }

    #[test]
    fn test_describe_all_keeps_order_and_duplicates() {
        let described = describe_all([
            "missing-input-secret",
            "invalid-input-response",
            "nope",
            "missing-input-secret",
        ]);

        assert_eq!(
            described,
            vec![
                "The secret parameter was not passed",
                "The response parameter (token) is invalid or has expired",
                UNKNOWN_ERROR,
                "The secret parameter was not passed",
            ]
        );
    }

    #[test]
    fn test_describe_is_stable() {
        for code in ErrorCode::ALL {
            assert_eq!(describe(code.as_str()), describe(code.as_str()));
            assert_eq!(describe(code.as_str()), code.description());
        }
    }

    #[test]
    fn test_wire_forms_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::InvalidHostname.to_string(), "invalid-hostname");
    }
}
