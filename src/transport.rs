use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::error::TransportError;

const USER_AGENT: &str = concat!("turnstile-siteverify/", env!("CARGO_PKG_VERSION"));

/// Sends the siteverify request.
///
/// Implementations must return the response body for any HTTP status.
/// Cloudflare answers rejected tokens with a JSON error body, so only
/// network-level problems are errors.
pub trait Transport: Send + Sync {
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        form: &'a [(&'a str, &'a str)],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, TransportError>>;
}

/// [`Transport`] backed by a shared [`reqwest::Client`]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(skip_tls_verify: bool) -> Result<Self, TransportError> {
        if skip_tls_verify {
            tracing::warn!("TLS certificate verification is disabled for Turnstile requests");
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(skip_tls_verify)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        form: &'a [(&'a str, &'a str)],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, TransportError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(url)
                .form(form)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| TransportError::from_reqwest(url, timeout, e))?;

            tracing::debug!(status = %response.status(), "siteverify responded");

            response
                .text()
                .await
                .map_err(|e| TransportError::from_reqwest(url, timeout, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_url_encoded_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/siteverify"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(header("user-agent", USER_AGENT))
            .and(body_string("secret=s3cr%26t&response=tok+en"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(false).unwrap();
        let url = format!("{}/siteverify", server.uri());
        let body = transport
            .post_form(
                &url,
                &[("secret", "s3cr&t"), ("response", "tok en")],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(body, r#"{"success":true}"#);
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"success":false,"error-codes":["bad-request"]}"#),
            )
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(false).unwrap();
        let body = transport
            .post_form(&server.uri(), &[], Duration::from_secs(5))
            .await
            .unwrap();

        assert!(body.contains("bad-request"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(false).unwrap();
        let err = transport
            .post_form(&server.uri(), &[], Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/siteverify", listener.local_addr().unwrap());
        drop(listener);

        let transport = ReqwestTransport::new(false).unwrap();
        let err = transport
            .post_form(&url, &[], Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Http { .. }));
    }
}
