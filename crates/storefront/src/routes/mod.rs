//! HTTP route handlers for the storefront and consoles.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /health                    - Health check
//! GET  /health/ready              - Readiness (auth service reachable)
//!
//! # Catalog (public)
//! GET  /products                  - Listing (?category, ?subcategory, ?q, ?page)
//! GET  /products/subcategories    - Subcategory <option>s for a category (HTMX)
//! GET  /products/{id}             - Product detail
//! GET  /stores                    - Store directory
//! GET  /stores/{id}               - Store page with its products
//!
//! # Auth (POSTs rate limited)
//! GET  /auth/login                - Login page
//! POST /auth/login                - Login action
//! GET  /auth/register             - Registration page
//! POST /auth/register             - Create account, send signup code
//! GET  /auth/verify               - Signup code page
//! POST /auth/verify               - Check signup code
//! POST /auth/verify/resend        - Send another signup code
//! GET  /auth/forgot               - Forgotten password page
//! POST /auth/forgot               - Send reset code
//! GET  /auth/reset                - Reset page
//! POST /auth/reset                - Set a new password
//! POST /auth/logout               - Logout action
//!
//! # Customer only
//! GET  /cart                      - Cart page
//! POST /cart/add                  - Add to cart (triggers cart-updated)
//! POST /cart/update               - Update quantity (cart_items fragment)
//! POST /cart/remove               - Remove item (cart_items fragment)
//! GET  /cart/count                - Cart count badge (fragment)
//! GET  /wishlist                  - Wishlist
//! POST /wishlist/add              - Save a product
//! POST /wishlist/remove           - Drop a product
//! POST /wishlist/move-to-cart     - Move a product into the cart
//! GET  /orders                    - Order history
//! GET  /orders/{id}               - Order detail with status timeline
//!
//! # Any signed-in role
//! GET  /account                   - Profile
//! POST /account                   - Update profile
//! GET  /notifications             - Notification feed (marks read)
//! GET  /notifications/count       - Unread badge (fragment)
//!
//! # Vendor only
//! GET  /vendor                    - Store status and sales
//! GET  /vendor/onboarding         - Wizard (?step=)
//! POST /vendor/onboarding/business|store|payout - Save a step
//! POST /vendor/onboarding/back    - Previous step
//! POST /vendor/onboarding/submit  - Send the application
//! GET  /vendor/products           - Listings
//! GET  /vendor/products/new       - Create form
//! POST /vendor/products           - Create listing
//! GET  /vendor/orders             - Order board (?tab, ?page, ?refresh)
//! POST /vendor/orders/status      - Change an order's status
//!
//! # Admin only
//! GET  /admin                     - Dashboard
//! GET  /admin/products            - Product approval board
//! POST /admin/products/status     - Approve/reject a product
//! GET  /admin/stores              - Store approval board
//! POST /admin/stores/status       - Approve/reject/suspend a store
//! GET  /admin/orders              - Order board
//! POST /admin/orders/status       - Change an order's status
//! GET  /admin/users               - Accounts (?role, ?page)
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod board;
pub mod cart;
pub mod catalog;
pub mod home;
pub mod layout;
pub mod notifications;
pub mod orders;
pub mod stores;
pub mod vendor;
pub mod wishlist;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use souk_core::{Role, RoleSet};

use crate::middleware::{RouteGuard, auth_rate_limiter, route_guard};
use crate::state::AppState;

/// Wrap `router` so only `allowed` roles reach it.
fn guarded(router: Router<AppState>, allowed: RoleSet) -> Router<AppState> {
    router.layer(from_fn_with_state(RouteGuard::new(allowed), route_guard))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let pages = Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/verify", get(auth::verify_page))
        .route("/forgot", get(auth::forgot_password_page))
        .route("/reset", get(auth::reset_password_page))
        .route("/logout", post(auth::logout));

    let mut actions = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/verify", post(auth::verify))
        .route("/verify/resend", post(auth::resend_code))
        .route("/forgot", post(auth::forgot_password))
        .route("/reset", post(auth::reset_password));
    if let Some(limiter) = auth_rate_limiter() {
        actions = actions.layer(limiter);
    }

    pages.merge(actions)
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/subcategories", get(catalog::subcategory_options))
        .route("/{id}", get(catalog::show))
}

/// Create the store directory router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(stores::index))
        .route("/{id}", get(stores::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::index))
        .route("/add", post(wishlist::add))
        .route("/remove", post(wishlist::remove))
        .route("/move-to-cart", post(wishlist::move_to_cart))
}

/// Create the order tracking router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new().route("/", get(account::index).post(account::update))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::index))
        .route("/count", get(notifications::count))
}

/// Create the vendor console router.
pub fn vendor_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(vendor::dashboard))
        .route("/onboarding", get(vendor::onboarding::show))
        .route("/onboarding/business", post(vendor::onboarding::business))
        .route("/onboarding/store", post(vendor::onboarding::store))
        .route("/onboarding/payout", post(vendor::onboarding::payout))
        .route("/onboarding/back", post(vendor::onboarding::back))
        .route("/onboarding/submit", post(vendor::onboarding::submit))
        .route(
            "/products",
            get(vendor::products::index).post(vendor::products::create),
        )
        .route("/products/new", get(vendor::products::new))
        .route("/orders", get(vendor::orders::index))
        .route("/orders/status", post(vendor::orders::update_status))
}

/// Create the admin console router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard))
        .route("/products", get(admin::approvals::products))
        .route("/products/status", post(admin::approvals::product_status))
        .route("/stores", get(admin::approvals::stores))
        .route("/stores/status", post(admin::approvals::store_status))
        .route("/orders", get(admin::approvals::orders))
        .route("/orders/status", post(admin::approvals::order_status))
        .route("/users", get(admin::users))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let customer = RoleSet::only(Role::Customer);

    Router::new()
        // Public pages
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/stores", store_routes())
        .nest("/auth", auth_routes())
        // Customer pages
        .nest("/cart", guarded(cart_routes(), customer))
        .nest("/wishlist", guarded(wishlist_routes(), customer))
        .nest("/orders", guarded(order_routes(), customer))
        // Any signed-in role
        .nest("/account", guarded(account_routes(), RoleSet::ANY))
        .nest("/notifications", guarded(notification_routes(), RoleSet::ANY))
        // Consoles
        .nest("/vendor", guarded(vendor_routes(), RoleSet::only(Role::Vendor)))
        .nest("/admin", guarded(admin_routes(), RoleSet::only(Role::Admin)))
}
