//! Session extractors and sign-in/sign-out helpers.
//!
//! Handlers receive the signed-in state explicitly through [`RequireSession`]
//! or [`OptionalSession`]; nothing reads it from a global.

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{Extensions, HeaderMap, HeaderValue, StatusCode, Uri, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::error::{LOGIN_EXPIRED_PATH, SessionRejected, clear_sentry_user, set_sentry_user};
use crate::models::{SessionData, session_keys};
use crate::services::notifications::existing_feed_key;
use crate::state::AppState;

/// Extractor that requires a signed-in session.
///
/// HTML requests without a session are redirected to the login page with a
/// `next` parameter; HTMX requests get a bare 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireSession(session): RequireSession) -> impl IntoResponse {
///     format!("Hello, {}!", session.display_name)
/// }
/// ```
pub struct RequireSession(pub SessionData);

/// Error returned when a session is required but the browser is signed out.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin(String),
    /// Unauthorized response (for API and HTMX requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => Redirect::to(&login_url(&next)).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Login page URL returning to `next` afterwards.
#[must_use]
pub fn login_url(next: &str) -> String {
    if next.is_empty() || next == "/" {
        "/auth/login".to_string()
    } else {
        format!("/auth/login?next={}", urlencoding::encode(next))
    }
}

/// Whether the request expects a bare status rather than a page. HTMX
/// fragment requests cannot follow a redirect to a full page.
#[must_use]
pub fn wants_bare_status(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Path and query as the browser sent them. Nested routers see the URI with
/// their prefix stripped, so the original is preferred.
#[must_use]
pub fn request_target(extensions: &Extensions, uri: &Uri) -> String {
    let uri = extensions.get::<OriginalUri>().map_or(uri, |original| &original.0);
    uri.path_and_query()
        .map_or_else(|| "/".to_string(), ToString::to_string)
}

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        let data = current_session(session).await.ok_or_else(|| {
            if wants_bare_status(&parts.headers) {
                AuthRejection::Unauthorized
            } else {
                AuthRejection::RedirectToLogin(request_target(&parts.extensions, &parts.uri))
            }
        })?;

        Ok(Self(data))
    }
}

/// Extractor that optionally gets the signed-in session.
///
/// Unlike `RequireSession`, this does not reject signed-out requests.
pub struct OptionalSession(pub Option<SessionData>);

impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let data = match parts.extensions.get::<Session>() {
            Some(session) => current_session(session).await,
            None => None,
        };

        Ok(Self(data))
    }
}

/// Read the signed-in state from the session.
pub async fn current_session(session: &Session) -> Option<SessionData> {
    session
        .get::<SessionData>(session_keys::SESSION_DATA)
        .await
        .ok()
        .flatten()
}

/// Sign a browser in.
///
/// A browser that is already signed in loses everything tied to the
/// previous account first: its notification listener is stopped and the
/// cart id, onboarding draft, cached boards and feed key are dropped. The
/// session id is then cycled so a pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_session(
    state: &AppState,
    session: &Session,
    data: &SessionData,
) -> Result<(), tower_sessions::session::Error> {
    let signed_in = current_session(session).await.is_some();
    let feed = existing_feed_key(session).await;
    if signed_in || feed.is_some() {
        if let Some(key) = feed {
            state.notifications().stop(&key).await;
        }
        debug!("Replacing an existing sign-in");
        session.clear().await;
    }
    session.cycle_id().await?;
    session.insert(session_keys::SESSION_DATA, data).await?;
    if let Some(user_id) = &data.user_id {
        set_sentry_user(user_id, Some(&data.email));
    }
    Ok(())
}

/// Sign a browser out.
///
/// Stops the session's notification listener, drops the cart id, the
/// onboarding draft and cached boards, then flushes the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_session(
    state: &AppState,
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    if let Some(key) = existing_feed_key(session).await {
        state.notifications().stop(&key).await;
    }
    session
        .remove::<SessionData>(session_keys::SESSION_DATA)
        .await?;
    session.remove_value(session_keys::CART_ID).await?;
    session.remove_value(session_keys::ONBOARDING_DRAFT).await?;
    session.flush().await?;
    clear_sentry_user();
    Ok(())
}

/// Clear the session when a handler reports that the services rejected its
/// token.
///
/// The handler's redirect is kept for full page loads; HTMX requests get a
/// 401 with `HX-Redirect` so the whole page navigates.
pub async fn session_expiry_middleware(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let is_htmx = wants_bare_status(request.headers());
    let response = next.run(request).await;

    if response.extensions().get::<SessionRejected>().is_none() {
        return response;
    }

    debug!("Service rejected the access token, signing out");
    if let Err(e) = clear_session(&state, &session).await {
        warn!(error = %e, "Failed to clear rejected session");
    }

    if is_htmx {
        let mut response = StatusCode::UNAUTHORIZED.into_response();
        response.headers_mut().insert(
            "HX-Redirect",
            HeaderValue::from_static(LOGIN_EXPIRED_PATH),
        );
        return response;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(login_url("/"), "/auth/login");
        assert_eq!(
            login_url("/orders?page=2"),
            "/auth/login?next=%2Forders%3Fpage%3D2"
        );
    }
}
