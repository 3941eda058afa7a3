use crate::{FormSubmission, Turnstile, VerifiedTurnstile, catalog};
use axum::{
    Json,
    body::{Body, to_bytes},
    http::{Method, Request, Response, StatusCode},
    response::IntoResponse,
};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::task::{Context, Poll};
use tower_service::Service;

/// Middleware that verifies Turnstile tokens on `POST` requests
#[derive(Clone, Debug)]
pub struct TurnstileMiddleware<S> {
    inner: S,
    turnstile: Turnstile,
}

impl<S> TurnstileMiddleware<S> {
    pub fn new(inner: S, turnstile: Turnstile) -> Self {
        Self { inner, turnstile }
    }
}

/// JSON body sent when a request is turned away
#[derive(Serialize)]
struct Rejection<'a> {
    success: bool,
    message: &'static str,
    errors: Vec<&'static str>,
    error_codes: &'a [String],
}

fn reject(status: StatusCode, error_codes: &[String]) -> Response<Body> {
    let body = Rejection {
        success: false,
        message: "Turnstile verification failed",
        errors: catalog::describe_all(error_codes),
        error_codes,
    };
    (status, Json(body)).into_response()
}

impl<S> Service<Request<Body>> for TurnstileMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let turnstile = self.turnstile.clone();
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        Box::pin(async move {
            if req.method() != Method::POST {
                tracing::debug!(method = %req.method(), "skipping Turnstile verification");
                return inner.call(req).await;
            }

            let (parts, body) = req.into_parts();
            let bytes = match to_bytes(body, turnstile.config().body_limit).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to buffer request body");
                    return Ok(StatusCode::PAYLOAD_TOO_LARGE.into_response());
                }
            };

            let submission = FormSubmission::from_parts(&parts, &bytes, turnstile.config()).await;

            match turnstile.verify_request(&submission).await {
                Ok(result) if result.success => {
                    // Token is valid - restore the body and attach the result
                    let mut req = Request::from_parts(parts, Body::from(bytes));
                    req.extensions_mut().insert(VerifiedTurnstile(result));
                    inner.call(req).await
                }
                Ok(result) => Ok(reject(StatusCode::BAD_REQUEST, &result.error_codes)),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        error_codes = ?e.error_codes(),
                        "Turnstile verification error"
                    );
                    Ok(reject(StatusCode::INTERNAL_SERVER_ERROR, e.error_codes()))
                }
            }
        })
    }
}
