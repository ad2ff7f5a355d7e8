//! REST clients for the marketplace microservices.
//!
//! # Architecture
//!
//! - One `reqwest::Client` shared by every service facade
//! - The services are the source of truth - NO local persistence, direct calls
//! - Catalog reads (categories, product detail) are cached in memory via
//!   `moka` with a 5 minute TTL
//!
//! # Services
//!
//! | Facade | Concern |
//! |--------|---------|
//! | [`AuthApi`] | login, registration, OTP, password reset, profiles, users |
//! | [`CartsApi`] | cart lookup/creation and line items |
//! | [`ProductsApi`] | catalog, categories, moderation |
//! | [`StoresApi`] | vendor stores, onboarding, sales dashboard |
//! | [`OrdersApi`] | order history and fulfilment |
//! | [`WishlistApi`] | saved products |
//! | [`RecommendationsApi`] | personalised and similar products |
//! | [`NotificationsApi`] | push channel (server-sent events) |
//!
//! Authenticated calls send `Authorization: Bearer <token>`; public catalog
//! calls send no credentials.
//!
//! # Example
//!
//! ```rust,ignore
//! let api = ApiClient::new(config.services.clone(), config.http_timeout)?;
//! let categories = api.products().categories().await?;
//! let cart = api.carts().get(&cart_id, session.access_token()).await?;
//! ```

mod auth;
mod carts;
mod notifications;
mod orders;
mod products;
mod recommendations;
mod stores;
pub mod types;
mod wishlist;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use souk_core::{Page, PageRequest};

use crate::config::ServiceEndpoints;

pub use auth::AuthApi;
pub use carts::CartsApi;
pub use notifications::{NotificationsApi, PushEvent};
pub use orders::OrdersApi;
pub use products::{ProductFilter, ProductsApi};
pub use recommendations::RecommendationsApi;
pub use stores::StoresApi;
pub use wishlist::WishlistApi;

use products::CatalogCacheValue;

/// Characters of an error body kept in [`ApiError`] messages.
const ERROR_MESSAGE_LIMIT: usize = 200;

/// Characters of an error body written to logs.
const ERROR_LOG_LIMIT: usize = 500;

/// The external service a call was made to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Auth,
    Carts,
    Products,
    Stores,
    Orders,
    Wishlist,
    Recommendations,
    Notifications,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Auth => "auth",
            Self::Carts => "cart",
            Self::Products => "product",
            Self::Stores => "store",
            Self::Orders => "order",
            Self::Wishlist => "wishlist",
            Self::Recommendations => "recommendation",
            Self::Notifications => "notification",
        })
    }
}

/// Errors that can occur when calling the marketplace services.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{service} service returned {status}: {message}")]
    Status {
        service: Service,
        status: u16,
        message: String,
    },

    /// The service rejected (or never received) the bearer token.
    #[error("{0} service rejected the access token")]
    Unauthorized(Service),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body did not have the expected shape.
    #[error("Failed to decode {service} response: {message}")]
    Decode { service: Service, message: String },

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether the failure means the session's token is no longer accepted.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// A short message that is safe to show in a toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(_) | Self::Decode { .. } => {
                "The service is unavailable right now. Please try again.".to_string()
            }
            Self::Status { message, .. } if !message.is_empty() => message.clone(),
            Self::Status { .. } | Self::InvalidRequest(_) => {
                "The request could not be completed.".to_string()
            }
            Self::Unauthorized(_) => "Your session has expired. Please sign in again.".to_string(),
            Self::NotFound(_) => "That item no longer exists.".to_string(),
            Self::RateLimited(secs) => format!("Too many requests. Try again in {secs}s."),
        }
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for every marketplace service.
///
/// Cheap to clone; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    /// Client without a total timeout, for long-lived event streams.
    streaming: reqwest::Client,
    endpoints: ServiceEndpoints,
    catalog_cache: Cache<String, CatalogCacheValue>,
}

impl ApiClient {
    /// Create a client for the given endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoints: ServiceEndpoints, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("souk-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let streaming = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("souk-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let catalog_cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                streaming,
                endpoints,
                catalog_cache,
            }),
        })
    }

    /// Auth service facade.
    #[must_use]
    pub const fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    /// Cart service facade.
    #[must_use]
    pub const fn carts(&self) -> CartsApi<'_> {
        CartsApi::new(self)
    }

    /// Product service facade.
    #[must_use]
    pub const fn products(&self) -> ProductsApi<'_> {
        ProductsApi::new(self)
    }

    /// Store service facade.
    #[must_use]
    pub const fn stores(&self) -> StoresApi<'_> {
        StoresApi::new(self)
    }

    /// Order service facade.
    #[must_use]
    pub const fn orders(&self) -> OrdersApi<'_> {
        OrdersApi::new(self)
    }

    /// Wishlist service facade.
    #[must_use]
    pub const fn wishlist(&self) -> WishlistApi<'_> {
        WishlistApi::new(self)
    }

    /// Recommendation service facade.
    #[must_use]
    pub const fn recommendations(&self) -> RecommendationsApi<'_> {
        RecommendationsApi::new(self)
    }

    /// Notification service facade.
    #[must_use]
    pub const fn notifications(&self) -> NotificationsApi<'_> {
        NotificationsApi::new(self)
    }

    /// Probe a service's base URL; any HTTP answer counts as reachable.
    pub async fn is_reachable(&self, service: Service) -> bool {
        self.inner
            .http
            .get(self.base(service))
            .send()
            .await
            .is_ok()
    }

    // =========================================================================
    // Request plumbing shared by the facades
    // =========================================================================

    fn base(&self, service: Service) -> &str {
        let e = &self.inner.endpoints;
        match service {
            Service::Auth => &e.auth,
            Service::Carts => &e.carts,
            Service::Products => &e.products,
            Service::Stores => &e.stores,
            Service::Orders => &e.orders,
            Service::Wishlist => &e.wishlist,
            Service::Recommendations => &e.recommendations,
            Service::Notifications => &e.notifications,
        }
    }

    /// Build a URL for `path` with the non-empty `query` pairs appended.
    pub(crate) fn url(
        &self,
        service: Service,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{path}", self.base(service)))
            .map_err(|e| ApiError::InvalidRequest(format!("{service} url: {e}")))?;
        let pairs: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
        if !pairs.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in pairs {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Start a request, attaching the bearer token when one is given.
    pub(crate) fn request(
        &self,
        method: Method,
        url: Url,
        token: Option<&SecretString>,
    ) -> RequestBuilder {
        let builder = self.inner.http.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Start a GET on the streaming client. Only the connect phase is timed.
    pub(crate) fn stream_request(&self, url: Url) -> RequestBuilder {
        self.inner
            .streaming
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
    }

    /// Send a request and hand back the response for streaming when the
    /// status is a success.
    pub(crate) async fn open_stream(
        &self,
        service: Service,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        read_body(service, response).await?;
        Err(ApiError::Status {
            service,
            status: status.as_u16(),
            message: String::new(),
        })
    }

    /// Send a request and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        service: Service,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.send_raw(service, request).await?;
        decode(service, &body)
    }

    /// Send a request whose success body may be empty.
    pub(crate) async fn send_optional<T: DeserializeOwned>(
        &self,
        service: Service,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let body = self.send_raw(service, request).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        decode(service, &body).map(Some)
    }

    /// Send a request and ignore the success body.
    pub(crate) async fn send_empty(
        &self,
        service: Service,
        request: RequestBuilder,
    ) -> Result<(), ApiError> {
        self.send_raw(service, request).await.map(|_| ())
    }

    /// Send a list request, accepting a bare array or a paging envelope.
    pub(crate) async fn send_page<T: DeserializeOwned>(
        &self,
        service: Service,
        request: RequestBuilder,
        page: PageRequest,
    ) -> Result<Page<T>, ApiError> {
        let body: types::ListBody<T> = self.send_json(service, request).await?;
        Ok(body.into_page(page))
    }

    async fn send_raw(&self, service: Service, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        read_body(service, response).await
    }

    pub(crate) fn catalog_cache(&self) -> &Cache<String, CatalogCacheValue> {
        &self.inner.catalog_cache
    }
}

/// Map a response to its body text or an [`ApiError`].
async fn read_body(service: Service, response: Response) -> Result<String, ApiError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(ApiError::RateLimited(retry_after));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized(service));
    }

    let body = response.text().await?;

    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(truncate(
            &error_message(&body).unwrap_or_else(|| format!("{service} resource")),
            ERROR_MESSAGE_LIMIT,
        )));
    }

    if !status.is_success() {
        tracing::error!(
            service = %service,
            status = %status,
            body = %truncate(&body, ERROR_LOG_LIMIT),
            "Service returned non-success status"
        );
        return Err(ApiError::Status {
            service,
            status: status.as_u16(),
            message: truncate(
                &error_message(&body).unwrap_or_default(),
                ERROR_MESSAGE_LIMIT,
            ),
        });
    }

    Ok(body)
}

fn decode<T: DeserializeOwned>(service: Service, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            service = %service,
            error = %e,
            body = %truncate(body, ERROR_LOG_LIMIT),
            "Failed to parse service response"
        );
        ApiError::Decode {
            service,
            message: e.to_string(),
        }
    })
}

/// Pull a human-readable message out of an error body.
///
/// Prefers a JSON `message` (or `error`) field and falls back to the raw text.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["message", "error", "detail"] {
            if let Some(msg) = value.get(key).and_then(serde_json::Value::as_str) {
                return Some(msg.to_string());
            }
        }
    }
    Some(trimmed.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(
            ServiceEndpoints::uniform("http://services.test/api"),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"message":"Email already registered","code":409}"#).as_deref(),
            Some("Email already registered")
        );
        assert_eq!(
            error_message(r#"{"error":"bad otp"}"#).as_deref(),
            Some("bad otp")
        );
        assert_eq!(error_message("gateway timeout").as_deref(), Some("gateway timeout"));
        assert_eq!(error_message("  "), None);
    }

    #[test]
    fn test_url_skips_empty_query_values() {
        let api = client();
        let url = api
            .url(
                Service::Products,
                "/products",
                &[("category", "books".to_string()), ("q", String::new())],
            )
            .unwrap();
        assert_eq!(url.as_str(), "http://services.test/api/products?category=books");
    }

    #[test]
    fn test_url_encodes_values() {
        let api = client();
        let url = api
            .url(Service::Products, "/products", &[("q", "red & blue".to_string())])
            .unwrap();
        assert_eq!(url.query(), Some("q=red+%26+blue"));
    }

    #[test]
    fn test_user_message_hides_transport_details() {
        let err = ApiError::Decode {
            service: Service::Orders,
            message: "expected value at line 1".to_string(),
        };
        assert!(!err.user_message().contains("line 1"));

        let err = ApiError::Status {
            service: Service::Auth,
            status: 409,
            message: "Email already registered".to_string(),
        };
        assert_eq!(err.user_message(), "Email already registered");
        assert!(ApiError::Unauthorized(Service::Carts).is_unauthorized());
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Status {
            service: Service::Stores,
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "store service returned 500: boom");
        assert_eq!(
            ApiError::RateLimited(30).to_string(),
            "Rate limited, retry after 30 seconds"
        );
    }
}
