//! Role-gated route guard.
//!
//! Applied with `axum::middleware::from_fn_with_state` on nested routers;
//! the allowed roles are the middleware state. A denied request never
//! reaches the protected handlers, so none of their service calls are made.
//!
//! ```rust,ignore
//! Router::new()
//!     .nest("/admin", admin_routes())
//!     .layer(from_fn_with_state(RouteGuard::only(Role::Admin), route_guard))
//! ```

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::debug;

use souk_core::{Role, RoleSet};

use crate::middleware::auth::{current_session, login_url, request_target, wants_bare_status};
use crate::models::SessionData;
use crate::routes::layout::stylesheet_href;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No signed-in session.
    Unauthenticated,
    /// Signed in under a role the route does not allow.
    RoleNotAllowed { role: Role },
}

/// Outcome of evaluating a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    Deny(DenyReason),
}

/// Roles allowed through a guarded router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteGuard {
    pub allowed: RoleSet,
}

impl RouteGuard {
    #[must_use]
    pub const fn new(allowed: RoleSet) -> Self {
        Self { allowed }
    }

    #[must_use]
    pub const fn only(role: Role) -> Self {
        Self::new(RoleSet::only(role))
    }

    /// Any signed-in role.
    #[must_use]
    pub const fn signed_in() -> Self {
        Self::new(RoleSet::ANY)
    }

    /// Decide whether a request with `session` may render.
    #[must_use]
    pub fn evaluate(&self, session: Option<&SessionData>) -> GuardDecision {
        match session {
            None => GuardDecision::Deny(DenyReason::Unauthenticated),
            Some(data) if self.allowed.contains(data.role) => GuardDecision::Render,
            Some(data) => GuardDecision::Deny(DenyReason::RoleNotAllowed { role: data.role }),
        }
    }
}

/// Page shown instead of a guarded route.
#[derive(Template, WebTemplate)]
#[template(path = "denied.html")]
pub struct DeniedTemplate {
    pub status: u16,
    pub title: String,
    pub message: String,
    pub login_href: Option<String>,
    pub home_href: String,
    pub stylesheet: String,
}

/// Guard middleware.
pub async fn route_guard(
    State(guard): State<RouteGuard>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let data = current_session(&session).await;

    match guard.evaluate(data.as_ref()) {
        GuardDecision::Render => next.run(request).await,
        GuardDecision::Deny(reason) => {
            debug!(path = %request_target(request.extensions(), request.uri()), ?reason, allowed = %guard.allowed, "Route guard denied request");
            deny(&request, reason)
        }
    }
}

fn deny(request: &Request, reason: DenyReason) -> Response {
    let status = match reason {
        DenyReason::Unauthenticated => StatusCode::UNAUTHORIZED,
        DenyReason::RoleNotAllowed { .. } => StatusCode::FORBIDDEN,
    };

    if wants_bare_status(request.headers()) {
        return status.into_response();
    }

    let page = match reason {
        DenyReason::Unauthenticated => DeniedTemplate {
            status: status.as_u16(),
            title: "Please sign in".to_string(),
            message: "You need to sign in to view this page.".to_string(),
            login_href: Some(login_url(&request_target(
                request.extensions(),
                request.uri(),
            ))),
            home_href: "/".to_string(),
            stylesheet: stylesheet_href(),
        },
        DenyReason::RoleNotAllowed { role } => DeniedTemplate {
            status: status.as_u16(),
            title: "Not available".to_string(),
            message: format!("This page is not available to {role} accounts."),
            login_href: None,
            home_href: role.home_path().to_string(),
            stylesheet: stylesheet_href(),
        },
    };

    (status, page).into_response()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn session(role: Role) -> SessionData {
        SessionData {
            access_token: SecretString::from("t"),
            refresh_token: None,
            role,
            user_id: None,
            email: "a@souk.in".to_string(),
            display_name: "A".to_string(),
            expires_at: None,
        }
    }

    #[test]
    fn test_unauthenticated_is_denied() {
        let guard = RouteGuard::signed_in();
        assert_eq!(
            guard.evaluate(None),
            GuardDecision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn test_role_not_in_set_is_denied() {
        let guard = RouteGuard::only(Role::Admin);
        assert_eq!(
            guard.evaluate(Some(&session(Role::Customer))),
            GuardDecision::Deny(DenyReason::RoleNotAllowed {
                role: Role::Customer
            })
        );
        assert_eq!(
            guard.evaluate(Some(&session(Role::Admin))),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_any_role_allows_every_role() {
        let guard = RouteGuard::signed_in();
        for role in Role::ALL {
            assert_eq!(guard.evaluate(Some(&session(role))), GuardDecision::Render);
        }
    }

    #[test]
    fn test_multi_role_set() {
        let guard = RouteGuard::new(RoleSet::of(&[Role::Vendor, Role::Admin]));
        assert_eq!(
            guard.evaluate(Some(&session(Role::Vendor))),
            GuardDecision::Render
        );
        assert!(matches!(
            guard.evaluate(Some(&session(Role::Customer))),
            GuardDecision::Deny(_)
        ));
    }
}
