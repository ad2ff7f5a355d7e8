//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, added by the binary)
//! 2. `TraceLayer` (request span with an empty `request_id` field)
//! 3. Request ID (fills the span field, tags Sentry)
//! 4. Security headers (CSP, frame and referrer policy)
//! 5. Session layer (tower-sessions with the in-memory store)
//! 6. Session expiry (sign out when the services reject the token)
//!
//! Route-level layers:
//! - Role guard on `/account`, `/orders`, `/wishlist`, `/notifications`,
//!   `/vendor` and `/admin`
//! - Rate limiting (governor) on the `/auth` forms

pub mod auth;
pub mod guard;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalSession, RequireSession, clear_session, session_expiry_middleware, set_session,
    wants_bare_status,
};
pub use guard::{DenyReason, GuardDecision, RouteGuard, route_guard};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
