use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cloudflare's siteverify endpoint
pub const DEFAULT_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEADER_NAME: &str = "CF-Turnstile-Token";
pub const DEFAULT_FIELD_NAME: &str = "cf-turnstile-response";
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Configuration for Turnstile verification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnstileConfig {
    /// Whether verification is performed at all
    pub enabled: bool,
    /// Cloudflare Turnstile secret key
    pub secret: String,
    /// Timeout for the siteverify request, in seconds
    pub timeout_secs: u64,
    /// Verification endpoint (default: Cloudflare's endpoint)
    pub verify_url: String,
    /// Enforce `allowed_hostnames` on successful results
    pub verify_hostname: bool,
    /// Hostnames a token may have been issued for. Empty allows any.
    pub allowed_hostnames: BTreeSet<String>,
    /// Header the middleware reads a token from (default: "CF-Turnstile-Token")
    pub header_name: String,
    /// Form field carrying the token (default: "cf-turnstile-response")
    pub field_name: String,
    /// Largest request body the middleware buffers
    pub body_limit: usize,
    /// Skip TLS certificate verification. Only for local test endpoints.
    pub insecure_skip_tls_verify: bool,
}

impl Default for TurnstileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            verify_hostname: false,
            allowed_hostnames: BTreeSet::new(),
            header_name: DEFAULT_HEADER_NAME.to_string(),
            field_name: DEFAULT_FIELD_NAME.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
            insecure_skip_tls_verify: false,
        }
    }
}

impl TurnstileConfig {
    /// Create a new config with the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Merge host-supplied overrides over the defaults, key by key
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        Self::default().merge(overrides)
    }

    /// Apply overrides on top of this config. Present keys win.
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        let ConfigOverrides {
            enable,
            secret_key,
            timeout,
            verify_url,
            verify_hostname,
            allowed_hostnames,
            header_name,
            field_name,
            body_limit,
            insecure_skip_tls_verify,
        } = overrides;

        if let Some(enable) = enable {
            self.enabled = enable;
        }
        if let Some(secret) = secret_key {
            self.secret = secret;
        }
        if let Some(timeout) = timeout {
            self.timeout_secs = timeout;
        }
        if let Some(url) = verify_url {
            self.verify_url = url;
        }
        if let Some(verify) = verify_hostname {
            self.verify_hostname = verify;
        }
        if let Some(hosts) = allowed_hostnames {
            self.allowed_hostnames = hosts;
        }
        if let Some(name) = header_name {
            self.header_name = name;
        }
        if let Some(name) = field_name {
            self.field_name = name;
        }
        if let Some(limit) = body_limit {
            self.body_limit = limit;
        }
        if let Some(insecure) = insecure_skip_tls_verify {
            self.insecure_skip_tls_verify = insecure;
        }
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set a custom header name
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Set a custom verification URL (for testing)
    pub fn with_verify_url(mut self, url: impl Into<String>) -> Self {
        self.verify_url = url.into();
        self
    }

    /// Only accept tokens issued for the given hostnames
    pub fn with_allowed_hostnames<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.verify_hostname = true;
        self.allowed_hostnames = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Disable TLS certificate verification for the siteverify request.
    ///
    /// Never enable this against Cloudflare's real endpoint; it exists for
    /// self-signed test servers only.
    pub fn danger_skip_tls_verify(mut self) -> Self {
        self.insecure_skip_tls_verify = true;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_hostname_allowed(&self, hostname: &str) -> bool {
        self.allowed_hostnames.is_empty() || self.allowed_hostnames.contains(hostname)
    }

    /// Report every problem that would keep verification from working
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if !self.enabled {
            issues.push(ConfigIssue::Disabled);
        }
        if self.secret.is_empty() {
            issues.push(ConfigIssue::MissingSecretKey);
        }
        if let Err(err) = url::Url::parse(&self.verify_url) {
            issues.push(ConfigIssue::InvalidVerifyUrl {
                url: self.verify_url.clone(),
                reason: err.to_string(),
            });
        }
        if self.timeout_secs == 0 {
            issues.push(ConfigIssue::ZeroTimeout);
        }

        issues
    }

    pub fn status(&self) -> ConfigStatus {
        let issues = self.validate();

        ConfigStatus {
            enabled: self.enabled,
            configured: !self.secret.is_empty(),
            valid: issues.is_empty(),
            issues: issues.iter().map(ToString::to_string).collect(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Host-supplied configuration overrides. Absent keys keep their defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub enable: Option<bool>,
    pub secret_key: Option<String>,
    pub timeout: Option<u64>,
    pub verify_url: Option<String>,
    pub verify_hostname: Option<bool>,
    pub allowed_hostnames: Option<BTreeSet<String>>,
    pub header_name: Option<String>,
    pub field_name: Option<String>,
    pub body_limit: Option<usize>,
    pub insecure_skip_tls_verify: Option<bool>,
}

/// A configuration problem found by [`TurnstileConfig::validate`]
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("Turnstile verification is disabled")]
    Disabled,

    #[error("Turnstile secret key is not configured")]
    MissingSecretKey,

    #[error("verify URL {url:?} is not valid: {reason}")]
    InvalidVerifyUrl { url: String, reason: String },

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Summary of the configuration, suitable for a health/status endpoint
#[derive(Clone, Debug, Serialize)]
pub struct ConfigStatus {
    pub enabled: bool,
    pub configured: bool,
    pub valid: bool,
    pub issues: Vec<String>,
    pub version: &'static str,
}
