//! Request ID middleware for request tracing and correlation.
//!
//! An `x-request-id` from a fronting proxy is reused when it looks sane,
//! otherwise a UUID v4 is minted. The id is recorded on the tracing span,
//! tagged on the Sentry scope, stored as a [`RequestId`] extension and echoed
//! in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_INCOMING_LEN: usize = 128;

/// Request id available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Use the caller's id only if it is short and printable.
fn incoming_id(value: Option<&HeaderValue>) -> Option<String> {
    let raw = value?.to_str().ok()?.trim();
    let acceptable = !raw.is_empty()
        && raw.len() <= MAX_INCOMING_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    acceptable.then(|| raw.to_string())
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = incoming_id(request.headers().get(REQUEST_ID_HEADER))
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_id_accepts_proxy_ids() {
        let value = HeaderValue::from_static("8f1c2a7e-0b1d-4c55-9f0e-2f4b0c1a9d33");
        assert_eq!(
            incoming_id(Some(&value)).as_deref(),
            Some("8f1c2a7e-0b1d-4c55-9f0e-2f4b0c1a9d33")
        );
    }

    #[test]
    fn test_incoming_id_rejects_junk() {
        assert_eq!(incoming_id(None), None);
        assert_eq!(incoming_id(Some(&HeaderValue::from_static(""))), None);
        assert_eq!(
            incoming_id(Some(&HeaderValue::from_static("<script>"))),
            None
        );
        let long = "a".repeat(MAX_INCOMING_LEN + 1);
        assert_eq!(
            incoming_id(Some(&HeaderValue::from_str(&long).unwrap_or_else(|_| {
                HeaderValue::from_static("x")
            }))),
            None
        );
    }
}
