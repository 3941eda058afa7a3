//! # turnstile-siteverify
//!
//! Server-side verification of [Cloudflare Turnstile](https://www.cloudflare.com/products/turnstile/)
//! tokens, with a Tower layer for [Axum](https://github.com/tokio-rs/axum).
//!
//! A Turnstile widget on your page produces a token. Your server forwards
//! that token and its secret key to Cloudflare's siteverify endpoint and
//! gets back a verdict. This crate performs that call and interprets the
//! result.
//!
//! ## Verifying a token
//!
//! ```rust,no_run
//! use turnstile_siteverify::{Turnstile, TurnstileConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let turnstile = Turnstile::new(TurnstileConfig::new("your-secret-key"))?;
//!
//! let result = turnstile.verify("token-from-the-form", Some("203.0.113.7")).await?;
//! if !result.success {
//!     println!("rejected: {:?}", result.error_messages());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`Turnstile::verify`] distinguishes two kinds of "no":
//!
//! - an unsuccessful [`VerificationResult`] for normal rejections: the
//!   service is disabled, the token is empty, Cloudflare refused it, or it
//!   was issued for a hostname outside the allow-list;
//! - a [`VerificationFailure`] when verification could not run at all: no
//!   secret key, the endpoint was unreachable, or it did not answer JSON.
//!
//! [`Turnstile::check`] folds both into a single `bool`.
//!
//! ## Configuration
//!
//! ```rust
//! use turnstile_siteverify::{ConfigOverrides, TurnstileConfig};
//!
//! let overrides: ConfigOverrides = serde_json::from_str(r#"{
//!     "secret_key": "your-secret-key",
//!     "timeout": 10,
//!     "verify_hostname": true,
//!     "allowed_hostnames": ["example.com"]
//! }"#).unwrap();
//!
//! let config = TurnstileConfig::resolve(overrides);
//! assert!(config.validate().is_empty());
//! ```
//!
//! ## Axum
//!
//! ```rust,no_run
//! use axum::{routing::post, Router};
//! use turnstile_siteverify::{TurnstileLayer, VerifiedTurnstile};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/signup", post(signup))
//!         .layer(TurnstileLayer::from_secret("your-secret-key").unwrap());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
//!         .await
//!         .unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//!
//! async fn signup(VerifiedTurnstile(result): VerifiedTurnstile) -> String {
//!     format!("verified for {:?}", result.hostname)
//! }
//! ```
//!
//! The layer checks `POST` requests only. The token is read from the
//! `cf-turnstile-response` form field (URL-encoded or multipart) or the
//! `CF-Turnstile-Token` header.
//!
//! - `400 Bad Request`: token missing or rejected
//! - `413 Payload Too Large`: body over the configured limit
//! - `500 Internal Server Error`: verification could not be performed
//!
//! Rejections carry a JSON body with `error_codes` and their descriptions.
//!
//! ## Testing
//!
//! Cloudflare provides test keys that always pass or fail verification:
//!
//! - **Always passes**: `1x0000000000000000000000000000000AA`
//! - **Always fails**: `2x0000000000000000000000000000000AA`

pub mod catalog;
mod config;
mod error;
mod layer;
mod middleware;
mod request;
mod transport;
mod verifier;

pub use catalog::{ErrorCode, describe, describe_all};
pub use config::{
    ConfigIssue, ConfigOverrides, ConfigStatus, DEFAULT_FIELD_NAME, DEFAULT_HEADER_NAME,
    DEFAULT_VERIFY_URL, TurnstileConfig,
};
pub use error::{TransportError, VerificationFailure};
pub use layer::TurnstileLayer;
pub use middleware::TurnstileMiddleware;
pub use request::{FormSubmission, TurnstileRequest, client_ip};
pub use transport::{ReqwestTransport, Transport};
pub use verifier::{Turnstile, VerificationResult};

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

/// Successful verification result, extractable in handlers behind [`TurnstileLayer`]
#[derive(Clone, Debug)]
pub struct VerifiedTurnstile(pub VerificationResult);

impl<S> FromRequestParts<S> for VerifiedTurnstile
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedTurnstile>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
