use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{self, ErrorCode};
use crate::error::{TransportError, VerificationFailure};
use crate::request::TurnstileRequest;
use crate::transport::{ReqwestTransport, Transport};
use crate::TurnstileConfig;

/// Outcome of a siteverify call
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(rename = "error-codes", default, deserialize_with = "null_as_empty")]
    pub error_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdata: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl VerificationResult {
    /// Unsuccessful result with a single error code
    pub fn rejected(code: ErrorCode) -> Self {
        Self {
            success: false,
            error_codes: vec![code.into()],
            ..Self::default()
        }
    }

    pub fn has_error_code(&self, code: &str) -> bool {
        self.error_codes.iter().any(|c| c == code)
    }

    pub fn error_messages(&self) -> Vec<&'static str> {
        catalog::describe_all(&self.error_codes)
    }

    /// Downgrade a successful result whose hostname is not allowed
    fn enforce_hostname(&mut self, config: &TurnstileConfig) {
        if !config.verify_hostname || !self.success {
            return;
        }

        let hostname = self.hostname.as_deref().unwrap_or_default();
        if !config.is_hostname_allowed(hostname) {
            tracing::warn!(hostname, "Turnstile token issued for a hostname that is not allowed");
            self.success = false;
            self.error_codes.push(ErrorCode::InvalidHostname.into());
        }
    }
}

/// Turnstile verifier bound to one configuration
#[derive(Clone)]
pub struct Turnstile {
    config: Arc<TurnstileConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Turnstile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Turnstile")
            .field("verify_url", &self.config.verify_url)
            .field("enabled", &self.config.enabled)
            .finish_non_exhaustive()
    }
}

impl Turnstile {
    /// Create a verifier that talks to `config.verify_url` over reqwest
    pub fn new(config: TurnstileConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.insecure_skip_tls_verify)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a verifier with just a secret key
    pub fn from_secret(secret: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(TurnstileConfig::new(secret))
    }

    pub fn with_transport(config: TurnstileConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &TurnstileConfig {
        &self.config
    }

    /// Verify a Turnstile token with Cloudflare.
    ///
    /// Rejections (disabled service, empty token, a token Cloudflare refuses,
    /// a disallowed hostname) come back as an unsuccessful
    /// [`VerificationResult`]. An `Err` means verification could not run:
    /// no secret configured, the endpoint was unreachable, or it answered
    /// with something other than JSON.
    pub async fn verify(
        &self,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<VerificationResult, VerificationFailure> {
        let config = &*self.config;

        if !config.enabled {
            return Ok(VerificationResult::rejected(ErrorCode::ServiceDisabled));
        }

        if config.secret.is_empty() {
            return Err(VerificationFailure::from_code(
                ErrorCode::MissingSecretKey,
                "Turnstile secret key is not configured",
            ));
        }

        if token.is_empty() {
            return Ok(VerificationResult::rejected(ErrorCode::MissingInputResponse));
        }

        let mut form = vec![("secret", config.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip.filter(|ip| !ip.is_empty()) {
            form.push(("remoteip", ip));
        }

        let body = self
            .transport
            .post_form(&config.verify_url, &form, config.timeout())
            .await
            .map_err(|e| {
                VerificationFailure::from_code(
                    ErrorCode::NetworkError,
                    "Failed to verify Turnstile token: HTTP request failed",
                )
                .with_source(e)
            })?;

        let mut result: VerificationResult = serde_json::from_str(&body).map_err(|e| {
            VerificationFailure::from_code(
                ErrorCode::InvalidResponse,
                format!("Failed to parse Turnstile response: {e}"),
            )
            .with_source(e)
        })?;

        result.enforce_hostname(config);

        tracing::debug!(
            success = result.success,
            hostname = ?result.hostname,
            error_codes = ?result.error_codes,
            "Turnstile token verified"
        );

        Ok(result)
    }

    /// Like [`verify`](Self::verify), reduced to a boolean.
    ///
    /// Operational failures count as `false` and are not propagated.
    pub async fn check(&self, token: &str, remote_ip: Option<&str>) -> bool {
        match self.verify(token, remote_ip).await {
            Ok(result) => result.success,
            Err(e) => {
                tracing::debug!(error = %e, "Turnstile check failed");
                false
            }
        }
    }

    /// Verify the token posted in `config.field_name`, using the request's client IP
    pub async fn verify_request<R>(&self, request: &R) -> Result<VerificationResult, VerificationFailure>
    where
        R: TurnstileRequest + ?Sized,
    {
        let token = request.post_field(&self.config.field_name).unwrap_or_default();
        self.verify(token, request.real_ip()).await
    }

    pub async fn check_request<R>(&self, request: &R) -> bool
    where
        R: TurnstileRequest + ?Sized,
    {
        let token = request.post_field(&self.config.field_name).unwrap_or_default();
        self.check(token, request.real_ip()).await
    }

    /// Verify a request and turn an unsuccessful result into a failure
    pub async fn verify_request_or_fail<R>(
        &self,
        request: &R,
    ) -> Result<VerificationResult, VerificationFailure>
    where
        R: TurnstileRequest + ?Sized,
    {
        let result = self.verify_request(request).await?;

        if !result.success {
            let message = format!(
                "Turnstile verification failed: {}",
                result.error_messages().join(", ")
            );
            return Err(VerificationFailure::new(message, result.error_codes));
        }

        Ok(result)
    }
}
