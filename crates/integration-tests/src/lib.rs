//! Integration test harness for the Souk storefront.
//!
//! Tests run the real storefront router against [`FakeMarketplace`], an
//! in-process stand-in for the marketplace services. Both listen on
//! ephemeral localhost ports, so the suite needs no external services:
//!
//! ```bash
//! cargo test -p souk-integration-tests
//! ```
//!
//! The fake knows four accounts (see [`Account`]) and a small moderation
//! queue (see [`PRODUCTS`]), and records every call it receives so tests can
//! assert on the service traffic a page caused.

#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use souk_core::Role;
use souk_storefront::config::{SentryConfig, ServiceEndpoints, StorefrontConfig};
use souk_storefront::state::AppState;

/// Password every fake account accepts.
pub const PASSWORD: &str = "correct-horse";

/// Accounts known to the fake auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Account {
    Shopper,
    /// A second customer, for sign-ins that replace one another.
    Buyer,
    Vendor,
    Admin,
}

impl Account {
    const ALL: [Self; 4] = [Self::Shopper, Self::Buyer, Self::Vendor, Self::Admin];

    #[must_use]
    pub const fn email(self) -> &'static str {
        match self {
            Self::Shopper => "shopper@souk.in",
            Self::Buyer => "buyer@souk.in",
            Self::Vendor => "vendor@souk.in",
            Self::Admin => "admin@souk.in",
        }
    }

    #[must_use]
    pub const fn user_id(self) -> &'static str {
        match self {
            Self::Shopper => "u-shopper",
            Self::Buyer => "u-buyer",
            Self::Vendor => "u-vendor",
            Self::Admin => "u-admin",
        }
    }

    #[must_use]
    pub const fn role(self) -> Role {
        match self {
            Self::Shopper | Self::Buyer => Role::Customer,
            Self::Vendor => Role::Vendor,
            Self::Admin => Role::Admin,
        }
    }

    /// Id of the cart the fake creates for this account.
    #[must_use]
    pub fn cart_id(self) -> String {
        cart_id_for(self.user_id())
    }

    fn by_email(email: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.email() == email)
    }
}

fn cart_id_for(user_id: &str) -> String {
    format!("cart-{user_id}")
}

/// Products in the fake moderation queue: id, name and starting status.
pub const PRODUCTS: [(&str, &str, &str); 3] = [
    ("p-saree", "Handloom saree", "pending"),
    ("p-lamp", "Brass lamp", "pending"),
    ("p-shawl", "Pashmina shawl", "approved"),
];

/// An unsigned token in the shape the auth service issues.
#[must_use]
pub fn token_for(account: Account) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = engine.encode(
        json!({
            "sub": account.user_id(),
            "role": account.role().as_str(),
            "exp": 4_102_444_800_u64,
        })
        .to_string(),
    );
    format!("{header}.{payload}.signature")
}

// =============================================================================
// Fake marketplace services
// =============================================================================

struct FakeState {
    calls: Mutex<Vec<String>>,
    /// Users that have a cart.
    carts: Mutex<HashSet<String>>,
    /// Product id to moderation status.
    product_status: Mutex<HashMap<String, String>>,
    reject_tokens: AtomicBool,
    fail_status_updates: AtomicBool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            carts: Mutex::default(),
            product_status: Mutex::new(
                PRODUCTS
                    .iter()
                    .map(|(id, _, status)| ((*id).to_string(), (*status).to_string()))
                    .collect(),
            ),
            reject_tokens: AtomicBool::new(false),
            fail_status_updates: AtomicBool::new(false),
        }
    }
}

/// In-process marketplace services.
#[derive(Clone)]
pub struct FakeMarketplace {
    state: Arc<FakeState>,
    base_url: String,
}

impl FakeMarketplace {
    /// Start the fake on an ephemeral port.
    pub async fn spawn() -> Self {
        let state = Arc::new(FakeState::default());
        let router = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(accepted))
            .route("/auth/otp/send", post(accepted))
            .route("/auth/otp/verify", post(verify_otp))
            .route("/carts/user/{user_id}", get(find_cart))
            .route("/carts", post(create_cart))
            .route("/carts/{cart_id}", get(cart))
            .route("/orders/user/{user_id}", get(empty_list))
            .route("/products/status/{status}", get(products_by_status))
            .route("/products/{id}/status", axum::routing::patch(update_product_status))
            .route("/stores/owner/{owner_id}", get(not_found))
            .fallback(not_found)
            .layer(from_fn_with_state(Arc::clone(&state), record))
            .with_state(Arc::clone(&state));

        let addr = serve(router).await;
        Self {
            state,
            base_url: format!("http://{addr}"),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Every call received so far, as `"METHOD /path"`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state
            .calls
            .lock()
            .expect("calls lock poisoned")
            .clone()
    }

    /// Whether `call` (`"METHOD /path"`) was received.
    #[must_use]
    pub fn was_called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    /// How many received calls start with `prefix`.
    #[must_use]
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Wait up to two seconds for `count` calls starting with `prefix`.
    /// Background work such as the notification listener calls in on its
    /// own schedule.
    pub async fn wait_for_calls(&self, prefix: &str, count: usize) -> bool {
        for _ in 0..100 {
            if self.count_calls(prefix) >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    /// Answer every authenticated call with 401 from now on, as if the
    /// access token had expired.
    pub fn reject_tokens(&self) {
        self.state.reject_tokens.store(true, Ordering::SeqCst);
    }

    /// Fail every product status change from now on.
    pub fn fail_status_updates(&self) {
        self.state.fail_status_updates.store(true, Ordering::SeqCst);
    }
}

async fn record(State(state): State<Arc<FakeState>>, request: Request, next: Next) -> Response {
    let call = format!("{} {}", request.method(), request.uri().path());
    state.calls.lock().expect("calls lock poisoned").push(call);

    let authenticated = request.headers().contains_key("authorization");
    if authenticated && state.reject_tokens.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "jwt expired"}))).into_response();
    }
    next.run(request).await
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(Json(body): Json<LoginBody>) -> Response {
    match Account::by_email(&body.email) {
        Some(account) if body.password == PASSWORD => Json(json!({
            "accessToken": token_for(account),
            "role": account.role().as_str(),
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid credentials"})),
        )
            .into_response(),
    }
}

/// Code the fake auth service accepts.
pub const VALID_OTP: &str = "042917";

#[derive(Deserialize)]
struct OtpBody {
    otp: String,
}

async fn verify_otp(Json(body): Json<OtpBody>) -> Response {
    Json(json!({"verified": body.otp == VALID_OTP})).into_response()
}

async fn accepted() -> Response {
    StatusCode::CREATED.into_response()
}

async fn find_cart(State(state): State<Arc<FakeState>>, Path(user_id): Path<String>) -> Response {
    let has_cart = state
        .carts
        .lock()
        .expect("carts lock poisoned")
        .contains(&user_id);
    if has_cart {
        Json(json!({"cartId": cart_id_for(&user_id)})).into_response()
    } else {
        not_found().await
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCartBody {
    user_id: String,
}

async fn create_cart(
    State(state): State<Arc<FakeState>>,
    Json(body): Json<CreateCartBody>,
) -> Response {
    let id = cart_id_for(&body.user_id);
    state
        .carts
        .lock()
        .expect("carts lock poisoned")
        .insert(body.user_id);
    (StatusCode::CREATED, Json(json!({"id": id}))).into_response()
}

async fn cart(Path(cart_id): Path<String>) -> Response {
    Json(json!({"id": cart_id, "items": []})).into_response()
}

fn product_json(id: &str, status: &str) -> serde_json::Value {
    let name = PRODUCTS
        .iter()
        .find(|(pid, _, _)| *pid == id)
        .map_or("Unknown", |(_, name, _)| *name);
    json!({
        "id": id,
        "name": name,
        "price": "1499.00",
        "storeName": "Loom House",
        "status": status,
    })
}

async fn products_by_status(
    State(state): State<Arc<FakeState>>,
    Path(status): Path<String>,
) -> Response {
    let statuses = state
        .product_status
        .lock()
        .expect("products lock poisoned")
        .clone();
    let products: Vec<_> = PRODUCTS
        .iter()
        .filter(|(id, _, _)| statuses.get(*id) == Some(&status))
        .map(|(id, _, _)| product_json(id, &status))
        .collect();
    Json(products).into_response()
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

async fn update_product_status(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Response {
    if state.fail_status_updates.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "Moderation queue is offline"})),
        )
            .into_response();
    }
    let mut statuses = state
        .product_status
        .lock()
        .expect("products lock poisoned");
    match statuses.get_mut(&id) {
        Some(status) => {
            status.clone_from(&body.status);
            Json(product_json(&id, &body.status)).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Not found"}))).into_response(),
    }
}

async fn empty_list() -> Response {
    Json(json!([])).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"message": "Not found"}))).into_response()
}

// =============================================================================
// Storefront
// =============================================================================

/// Storefront configuration with every service at `services`.
#[must_use]
pub fn test_config(services: &str) -> StorefrontConfig {
    StorefrontConfig {
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        base_url: "http://localhost".to_string(),
        services: ServiceEndpoints::uniform(services),
        http_timeout: Duration::from_secs(2),
        session_ttl: Duration::from_secs(60 * 60),
        sentry: SentryConfig {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        },
    }
}

/// The storefront router, for in-process `oneshot` tests.
#[must_use]
pub fn storefront_router(services: &str) -> Router {
    let state = AppState::new(test_config(services)).expect("Failed to build app state");
    souk_storefront::app(state)
}

/// A storefront listening on an ephemeral port.
pub struct Storefront {
    base_url: String,
    client: reqwest::Client,
}

impl Storefront {
    /// Serve the storefront against `marketplace`.
    pub async fn spawn(marketplace: &FakeMarketplace) -> Self {
        let addr = serve(storefront_router(marketplace.base_url())).await;
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: format!("http://{addr}"),
            client,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` with this browser's cookies.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// GET `path` as an HTMX fragment request.
    pub async fn get_fragment(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("hx-request", "true")
            .send()
            .await
            .expect("HTMX request failed")
    }

    /// POST a form to `path` as an HTMX request.
    pub async fn post_fragment(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("hx-request", "true")
            .form(form)
            .send()
            .await
            .expect("HTMX POST request failed")
    }

    /// POST a form to `path`.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Sign in as `account`, returning the login response.
    pub async fn login(&self, account: Account) -> reqwest::Response {
        self.post_form(
            "/auth/login",
            &[("email", account.email()), ("password", PASSWORD)],
        )
        .await
    }
}

/// `Location` header of a redirect, or an empty string.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        let service = router.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            panic!("test server failed: {e}");
        }
    });
    addr
}
