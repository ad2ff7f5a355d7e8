//! Route guard and public surface, exercised in-process.
//!
//! The services point at a closed port, so every page here must render
//! (or be denied) without a working backend.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use souk_integration_tests::storefront_router;

/// Nothing listens on the discard port.
const DEAD_SERVICES: &str = "http://127.0.0.1:9";

async fn send(request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = storefront_router(DEAD_SERVICES)
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).expect("valid request")
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_auth_service() {
    let (status, _, _) = send(get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let (_, headers, _) = send(get("/health")).await;
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_signed_out_customer_page_is_denied_with_login_link() {
    let (status, _, body) = send(get("/cart")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("/auth/login?next=%2Fcart"), "{body}");
}

#[tokio::test]
async fn test_signed_out_console_pages_are_denied() {
    for path in ["/vendor", "/vendor/orders", "/admin", "/admin/products", "/account"] {
        let (status, _, _) = send(get(path)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
async fn test_htmx_denial_is_a_bare_status() {
    let request = Request::get("/cart/count")
        .header("hx-request", "true")
        .body(Body::empty())
        .expect("valid request");
    let (status, _, body) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_public_pages_render_without_services() {
    for path in ["/", "/products", "/stores", "/auth/login", "/auth/register"] {
        let (status, headers, body) = send(get(path)).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert!(
            headers[header::CONTENT_TYPE]
                .to_str()
                .unwrap_or_default()
                .starts_with("text/html"),
            "{path}"
        );
        assert!(body.contains("<html"), "{path}");
    }
}

#[tokio::test]
async fn test_login_page_shows_expiry_notice() {
    let (status, _, body) = send(get("/auth/login?expired=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Your session has expired"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (status, _, _) = send(get("/no-such-page")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
