//! Inbound request contract.
//!
//! The verifier only needs two things from an incoming request: a posted
//! form field holding the token and the client's address. Hosts other than
//! axum can implement [`TurnstileRequest`] on their own request type.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, header, request::Parts};
use futures_util::stream;

use crate::TurnstileConfig;

const URL_ENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// A request that may carry a Turnstile token
pub trait TurnstileRequest {
    /// Value of a posted form field
    fn post_field(&self, name: &str) -> Option<&str>;

    /// Best guess at the client's real IP address
    fn real_ip(&self) -> Option<&str>;
}

/// Owned form fields plus client address
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormSubmission {
    pub fields: HashMap<String, String>,
    pub client_ip: Option<String>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    /// Build a submission from buffered request parts and body.
    ///
    /// URL-encoded and multipart bodies are parsed into fields; file parts
    /// are skipped. A token sent in the configured header fills the token
    /// field when the form lacks it.
    pub async fn from_parts(parts: &Parts, body: &Bytes, config: &TurnstileConfig) -> Self {
        let mut fields = HashMap::new();

        match media_type(&parts.headers) {
            Some(ct) if ct.eq_ignore_ascii_case(URL_ENCODED) => {
                fields.extend(
                    url::form_urlencoded::parse(body).map(|(k, v)| (k.into_owned(), v.into_owned())),
                );
            }
            Some(ct) if ct.eq_ignore_ascii_case(MULTIPART) => {
                if let Err(e) = read_multipart(&parts.headers, body.clone(), &mut fields).await {
                    tracing::warn!(error = %e, "failed to parse multipart form");
                }
            }
            _ => {}
        }

        if let Some(token) = parts
            .headers
            .get(config.header_name.as_str())
            .and_then(|v| v.to_str().ok())
        {
            fields
                .entry(config.field_name.clone())
                .or_insert_with(|| token.to_string());
        }

        Self {
            fields,
            client_ip: client_ip(parts),
        }
    }
}

impl TurnstileRequest for FormSubmission {
    fn post_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn real_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }
}

/// Media type of the body without parameters, e.g. `multipart/form-data`
fn media_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
}

/// Collect the text parts of a multipart body
async fn read_multipart(
    headers: &HeaderMap,
    body: Bytes,
    fields: &mut HashMap<String, String>,
) -> Result<(), multer::Error> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = multer::parse_boundary(content_type)?;
    let stream = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field.text().await?;
        fields.insert(name, value);
    }

    Ok(())
}

/// Client IP from proxy headers, falling back to the peer address
pub fn client_ip(parts: &Parts) -> Option<String> {
    let headers = &parts.headers;

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);

    let from_header = forwarded
        .into_iter()
        .chain(
            ["x-real-ip", "client-ip"]
                .into_iter()
                .filter_map(|name| headers.get(name).and_then(|v| v.to_str().ok()))
                .map(str::trim),
        )
        .find(|ip| !ip.is_empty());

    from_header.map(str::to_string).or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn request_parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    async fn submission(parts: &Parts, body: &'static [u8]) -> FormSubmission {
        FormSubmission::from_parts(parts, &Bytes::from_static(body), &TurnstileConfig::default()).await
    }

    #[tokio::test]
    async fn test_form_fields_parsed() {
        let parts = request_parts(
            Request::post("/submit").header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
        );
        let submission = submission(&parts, b"name=Ada&cf-turnstile-response=abc%2B123").await;

        assert_eq!(submission.post_field("name"), Some("Ada"));
        assert_eq!(submission.post_field("cf-turnstile-response"), Some("abc+123"));
        assert_eq!(submission.real_ip(), None);
    }

    #[tokio::test]
    async fn test_media_type_is_case_insensitive() {
        let parts = request_parts(
            Request::post("/submit")
                .header(header::CONTENT_TYPE, "Application/X-WWW-Form-URLEncoded; charset=UTF-8"),
        );
        let submission = submission(&parts, b"cf-turnstile-response=abc").await;

        assert_eq!(submission.post_field("cf-turnstile-response"), Some("abc"));
    }

    #[tokio::test]
    async fn test_multipart_text_fields_parsed() {
        let parts = request_parts(
            Request::post("/submit").header(header::CONTENT_TYPE, "Multipart/Form-Data; boundary=XX"),
        );
        let body = b"--XX\r\n\
Content-Disposition: form-data; name=\"name\"\r\n\r\n\
Ada\r\n\
--XX\r\n\
Content-Disposition: form-data; name=\"avatar\"; filename=\"a.png\"\r\n\
Content-Type: image/png\r\n\r\n\
PNGDATA\r\n\
--XX\r\n\
Content-Disposition: form-data; name=\"cf-turnstile-response\"\r\n\r\n\
tok\r\n\
--XX--\r\n";
        let submission = submission(&parts, body).await;

        assert_eq!(submission.post_field("name"), Some("Ada"));
        assert_eq!(submission.post_field("cf-turnstile-response"), Some("tok"));
        assert_eq!(submission.post_field("avatar"), None);
    }

    #[tokio::test]
    async fn test_malformed_multipart_yields_no_fields() {
        let parts = request_parts(
            Request::post("/submit").header(header::CONTENT_TYPE, "multipart/form-data; boundary=XX"),
        );
        let submission = submission(&parts, b"not multipart at all").await;

        assert!(submission.fields.is_empty());
    }

    #[tokio::test]
    async fn test_non_form_body_ignored() {
        let parts = request_parts(Request::post("/submit").header(header::CONTENT_TYPE, "application/json"));
        let submission = submission(&parts, b"cf-turnstile-response=abc").await;

        assert!(submission.fields.is_empty());
    }

    #[tokio::test]
    async fn test_header_token_fills_missing_field() {
        let parts = request_parts(Request::post("/submit").header("CF-Turnstile-Token", "from-header"));
        let from_header = submission(&parts, b"").await;
        assert_eq!(from_header.post_field("cf-turnstile-response"), Some("from-header"));

        let parts = request_parts(
            Request::post("/submit")
                .header("CF-Turnstile-Token", "from-header")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
        );
        let from_form = submission(&parts, b"cf-turnstile-response=from-form").await;
        assert_eq!(from_form.post_field("cf-turnstile-response"), Some("from-form"));
    }

    #[test]
    fn test_client_ip_precedence() {
        let forwarded = request_parts(
            Request::post("/")
                .header("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")
                .header("x-real-ip", "198.51.100.2"),
        );
        assert_eq!(client_ip(&forwarded).as_deref(), Some("203.0.113.7"));

        let real = request_parts(Request::post("/").header("x-real-ip", "198.51.100.2"));
        assert_eq!(client_ip(&real).as_deref(), Some("198.51.100.2"));

        let mut peer = request_parts(Request::post("/").header("x-forwarded-for", ""));
        peer.extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_ip(&peer).as_deref(), Some("192.0.2.1"));

        assert_eq!(client_ip(&request_parts(Request::post("/"))), None);
    }
}
