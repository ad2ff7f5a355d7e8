//! Authentication route handlers.
//!
//! Login, registration with email OTP verification, password reset via OTP,
//! and logout. Every form is validated before the auth service is called.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use souk_core::{Email, Role};

use crate::api::ApiError;
use crate::api::types::OtpPurpose;
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{OptionalSession, clear_session, set_session};
use crate::models::toast::push_flash;
use crate::models::{SessionData, Toast, session_keys};
use crate::routes::layout::Layout;
use crate::services::cart_bootstrap::session_cart;
use crate::services::notifications::feed_key;
use crate::services::validation::{self, FieldErrors, OTP_PROMPT};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
}

/// OTP verification form data.
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    pub otp: String,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub otp: String,
    pub password: String,
    pub confirm_password: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters of the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
    pub expired: Option<u8>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub name: String,
    pub email: String,
    pub role: String,
    pub errors: FieldErrors,
}

/// OTP entry page template, shared by signup verification and reset.
#[derive(Template, WebTemplate)]
#[template(path = "auth/verify.html")]
pub struct VerifyTemplate {
    pub layout: Layout,
    pub email: String,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub layout: Layout,
    pub email: String,
    pub error: Option<String>,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub layout: Layout,
    pub email: String,
    pub errors: FieldErrors,
}

// =============================================================================
// Helpers
// =============================================================================

/// A same-site path to return to after login.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim).filter(|n| {
        n.starts_with('/') && !n.starts_with("//") && !n.starts_with("/\\") && !n.starts_with("/auth")
    })
}

async fn pending_email(session: &Session, key: &str) -> Option<String> {
    session.get::<String>(key).await.ok().flatten()
}

async fn remember_email(session: &Session, key: &str, email: &str) {
    if let Err(e) = session.insert(key, email).await {
        warn!(error = %e, "Failed to store pending email");
    }
}

async fn forget_email(session: &Session, key: &str) {
    if let Err(e) = session.remove_value(key).await {
        warn!(error = %e, "Failed to clear pending email");
    }
}

/// Show the OTP step again with a toast.
async fn verify_retry(session: &Session, email: String, toast: Toast) -> Response {
    VerifyTemplate {
        layout: Layout::with_toast(session, None, toast).await,
        email,
    }
    .into_response()
}

/// Work done right after a successful login: resolve the cart for
/// customers and start the notification listener.
async fn after_login(state: &AppState, session: &Session, data: &SessionData) {
    if data.role == Role::Customer && session_cart(session, state.api(), &data.access_token).await.is_none() {
        warn!("Cart not available after login");
    }

    let key = feed_key(session).await;
    state
        .notifications()
        .start(&key, state.api(), &data.access_token)
        .await;
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(session, viewer))]
pub async fn login_page(
    session: Session,
    OptionalSession(viewer): OptionalSession,
    Query(query): Query<LoginQuery>,
) -> Response {
    if let Some(viewer) = viewer {
        return Redirect::to(viewer.role.home_path()).into_response();
    }

    let layout = if query.expired.is_some() {
        Layout::with_toast(
            &session,
            None,
            Toast::warning("Your session has expired. Please sign in again."),
        )
        .await
    } else {
        Layout::new(&session, None).await
    };

    LoginTemplate {
        layout,
        email: String::new(),
        next: safe_next(query.next.as_deref()).unwrap_or_default().to_string(),
        error: None,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).map(str::to_string);
    let render_error = |message: &str| LoginTemplate {
        layout: Layout::anonymous(),
        email: form.email.clone(),
        next: next.clone().unwrap_or_default(),
        error: Some(message.to_string()),
    };

    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(_) => return render_error("Enter a valid email address").into_response(),
    };
    if form.password.is_empty() {
        return render_error("Enter your password").into_response();
    }

    let response = match state.api().auth().login(email.as_str(), &form.password).await {
        Ok(response) => response,
        Err(ApiError::Unauthorized(_) | ApiError::NotFound(_)) => {
            return render_error("Invalid email or password").into_response();
        }
        Err(ApiError::Status { status: 400..=499, message, .. }) if !message.is_empty() => {
            return render_error(&message).into_response();
        }
        Err(e) => {
            warn!(error = %e, "Login failed");
            return render_error(&e.user_message()).into_response();
        }
    };

    let data = SessionData::from_login(response, email.as_str());
    if let Err(e) = set_session(&state, &session, &data).await {
        error!(error = %e, "Failed to store session");
        return render_error("Could not sign you in. Please try again.").into_response();
    }
    info!(role = %data.role, "Signed in");
    add_breadcrumb("auth", "Signed in", Some(&[("role", data.role.as_str())]));

    after_login(&state, &session, &data).await;

    push_flash(&session, &Toast::success(format!("Welcome back, {}", data.display_name))).await;
    let target = next.unwrap_or_else(|| data.role.home_path().to_string());
    Redirect::to(&target).into_response()
}

/// Sign out.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    if let Err(e) = clear_session(&state, &session).await {
        error!(error = %e, "Failed to clear session");
    }
    push_flash(&session, &Toast::info("You have been signed out")).await;
    Redirect::to("/").into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(session))]
pub async fn register_page(session: Session) -> impl IntoResponse {
    RegisterTemplate {
        layout: Layout::new(&session, None).await,
        name: String::new(),
        email: String::new(),
        role: Role::Customer.as_str().to_string(),
        errors: FieldErrors::new(),
    }
}

/// Handle registration: create the account, then send the verification
/// code and continue to the OTP step.
#[instrument(skip(state, session, form), fields(email = %form.email, role = %form.role))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let rerender = |errors: FieldErrors, layout: Layout| RegisterTemplate {
        layout,
        name: form.name.clone(),
        email: form.email.clone(),
        role: form.role.clone(),
        errors,
    };

    let signup = match validation::registration(
        &form.name,
        &form.email,
        &form.password,
        &form.confirm_password,
        &form.role,
    ) {
        Ok(signup) => signup,
        Err(errors) => return rerender(errors, Layout::new(&session, None).await).into_response(),
    };

    let auth = state.api().auth();
    if let Err(e) = auth
        .register(&signup.name, signup.email.as_str(), &form.password, signup.role)
        .await
    {
        warn!(error = %e, "Registration failed");
        let mut errors = FieldErrors::new();
        errors.push("email", e.user_message());
        return rerender(errors, Layout::new(&session, None).await).into_response();
    }

    if let Err(e) = auth.send_otp(signup.email.as_str(), OtpPurpose::Signup).await {
        warn!(error = %e, "Failed to send signup OTP");
        push_flash(
            &session,
            &Toast::warning("We could not send your code. Use \"Resend code\" to try again."),
        )
        .await;
    }

    remember_email(&session, session_keys::PENDING_SIGNUP, signup.email.as_str()).await;
    Redirect::to("/auth/verify").into_response()
}

/// Display the signup OTP step.
#[instrument(skip(session))]
pub async fn verify_page(session: Session) -> Response {
    let Some(email) = pending_email(&session, session_keys::PENDING_SIGNUP).await else {
        return Redirect::to("/auth/register").into_response();
    };
    VerifyTemplate {
        layout: Layout::new(&session, None).await,
        email,
    }
    .into_response()
}

/// Check the signup OTP.
///
/// An incomplete code is answered with a warning and never reaches the
/// auth service.
#[instrument(skip(state, session, form))]
pub async fn verify(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<VerifyForm>,
) -> Response {
    let Some(email) = pending_email(&session, session_keys::PENDING_SIGNUP).await else {
        return Redirect::to("/auth/register").into_response();
    };

    let otp = match validation::otp(&form.otp) {
        Ok(otp) => otp,
        Err(prompt) => return verify_retry(&session, email, Toast::warning(prompt)).await,
    };

    match state.api().auth().verify_otp(&email, otp.as_str()).await {
        Ok(true) => {
            forget_email(&session, session_keys::PENDING_SIGNUP).await;
            push_flash(&session, &Toast::success("Email verified. You can sign in now.")).await;
            Redirect::to("/auth/login").into_response()
        }
        Ok(false) => {
            verify_retry(&session, email, Toast::error("That code is incorrect or has expired")).await
        }
        Err(e) => {
            warn!(error = %e, "OTP verification failed");
            verify_retry(&session, email, Toast::error(e.user_message())).await
        }
    }
}

/// Send the signup OTP again.
#[instrument(skip(state, session))]
pub async fn resend_code(State(state): State<AppState>, session: Session) -> Response {
    let Some(email) = pending_email(&session, session_keys::PENDING_SIGNUP).await else {
        return Redirect::to("/auth/register").into_response();
    };

    let toast = match state.api().auth().send_otp(&email, OtpPurpose::Signup).await {
        Ok(()) => Toast::info(format!("A new code was sent to {email}")),
        Err(e) => {
            warn!(error = %e, "Failed to resend signup OTP");
            Toast::error(e.user_message())
        }
    };
    push_flash(&session, &toast).await;
    Redirect::to("/auth/verify").into_response()
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
#[instrument(skip(session))]
pub async fn forgot_password_page(session: Session) -> impl IntoResponse {
    ForgotPasswordTemplate {
        layout: Layout::new(&session, None).await,
        email: String::new(),
        error: None,
    }
}

/// Send a password reset code.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(_) => {
            return ForgotPasswordTemplate {
                layout: Layout::new(&session, None).await,
                email: form.email,
                error: Some("Enter a valid email address".to_string()),
            }
            .into_response();
        }
    };

    if let Err(e) = state
        .api()
        .auth()
        .send_otp(email.as_str(), OtpPurpose::PasswordReset)
        .await
    {
        warn!(error = %e, "Failed to send reset OTP");
        return ForgotPasswordTemplate {
            layout: Layout::new(&session, None).await,
            email: form.email,
            error: Some(e.user_message()),
        }
        .into_response();
    }

    remember_email(&session, session_keys::PENDING_RESET, email.as_str()).await;
    push_flash(&session, &Toast::info(format!("We sent a code to {email}"))).await;
    Redirect::to("/auth/reset").into_response()
}

/// Display the reset password page.
#[instrument(skip(session))]
pub async fn reset_password_page(session: Session) -> Response {
    let Some(email) = pending_email(&session, session_keys::PENDING_RESET).await else {
        return Redirect::to("/auth/forgot").into_response();
    };
    ResetPasswordTemplate {
        layout: Layout::new(&session, None).await,
        email,
        errors: FieldErrors::new(),
    }
    .into_response()
}

/// Set a new password with the emailed code.
#[instrument(skip(state, session, form))]
pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let Some(email) = pending_email(&session, session_keys::PENDING_RESET).await else {
        return Redirect::to("/auth/forgot").into_response();
    };

    let mut errors = FieldErrors::new();
    let otp = match validation::otp(&form.otp) {
        Ok(otp) => Some(otp),
        Err(prompt) => {
            errors.push("otp", prompt);
            None
        }
    };
    validation::password_rules(&mut errors, &form.password, &form.confirm_password);

    let Some(otp) = otp.filter(|_| errors.is_empty()) else {
        let toast = if errors.get("otp").is_some() {
            Toast::warning(OTP_PROMPT)
        } else {
            Toast::error(errors.first().unwrap_or("Check the form and try again"))
        };
        return ResetPasswordTemplate {
            layout: Layout::with_toast(&session, None, toast).await,
            email,
            errors,
        }
        .into_response();
    };

    match state
        .api()
        .auth()
        .reset_password(&email, otp.as_str(), &form.password)
        .await
    {
        Ok(()) => {
            forget_email(&session, session_keys::PENDING_RESET).await;
            push_flash(&session, &Toast::success("Password updated. Sign in with your new password.")).await;
            Redirect::to("/auth/login").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Password reset failed");
            ResetPasswordTemplate {
                layout: Layout::with_toast(&session, None, Toast::error(e.user_message())).await,
                email,
                errors: FieldErrors::new(),
            }
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next(Some("/orders?page=2")), Some("/orders?page=2"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/auth/login")), None);
        assert_eq!(safe_next(None), None);
    }
}
