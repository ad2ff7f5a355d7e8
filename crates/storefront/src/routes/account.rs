//! Account route handlers (profile), available to every signed-in role.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use crate::api::types::{Profile, ProfileUpdate};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireSession;
use crate::models::toast::push_flash;
use crate::models::{Toast, session_keys};
use crate::routes::layout::Layout;
use crate::services::validation::FieldErrors;
use crate::state::AppState;

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ProfileForm {
    fn validate(&self) -> std::result::Result<ProfileUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.required("name", "Name", &self.name);
        let phone = self
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(phone) = phone {
            errors.digits_between("phone", "Phone", phone, 10, 10);
        }
        errors.finish(ProfileUpdate {
            name: self.name.trim().to_string(),
            phone: phone.map(str::to_string),
            address: self
                .address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
        })
    }
}

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub layout: Layout,
    pub email: String,
    pub role_label: &'static str,
    pub profile: Option<Profile>,
    pub expires_at: Option<DateTime<Utc>>,
    pub errors: FieldErrors,
}

/// Display the profile.
///
/// # Errors
///
/// Returns an error if the service rejects the session's token.
#[instrument(skip(state, session, data))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
) -> Result<impl IntoResponse> {
    let profile = match state.api().auth().profile(&data.access_token).await {
        Ok(profile) => Some(profile),
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to load profile");
            None
        }
    };

    Ok(AccountTemplate {
        layout: Layout::new(&session, Some(&data)).await,
        email: data.email.clone(),
        role_label: data.role.label(),
        profile,
        expires_at: data.expires_at,
        errors: FieldErrors::new(),
    })
}

/// Update name, phone and address.
///
/// # Errors
///
/// Returns an error if the service rejects the session's token.
#[instrument(skip(state, session, data))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let update = match form.validate() {
        Ok(update) => update,
        Err(errors) => {
            let profile = state.api().auth().profile(&data.access_token).await.ok();
            return Ok(AccountTemplate {
                layout: Layout::with_toast(
                    &session,
                    Some(&data),
                    Toast::warning(errors.first().unwrap_or("Check the form")),
                )
                .await,
                email: data.email.clone(),
                role_label: data.role.label(),
                profile,
                expires_at: data.expires_at,
                errors,
            }
            .into_response());
        }
    };

    match state
        .api()
        .auth()
        .update_profile(&data.access_token, &update)
        .await
    {
        Ok(_) => {
            if update.name != data.display_name {
                let mut renamed = data.clone();
                renamed.display_name.clone_from(&update.name);
                if let Err(e) = session
                    .insert(session_keys::SESSION_DATA, &renamed)
                    .await
                {
                    warn!(error = %e, "Failed to refresh display name");
                }
            }
            push_flash(&session, &Toast::success("Profile updated")).await;
        }
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to update profile");
            push_flash(&session, &Toast::error(e.user_message())).await;
        }
    }

    Ok(Redirect::to("/account").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_form_trims_and_drops_blanks() {
        let form = ProfileForm {
            name: " Asha ".to_string(),
            phone: Some(String::new()),
            address: Some("  12 MG Road ".to_string()),
        };
        let update = form.validate().unwrap();
        assert_eq!(update.name, "Asha");
        assert_eq!(update.phone, None);
        assert_eq!(update.address.as_deref(), Some("12 MG Road"));
    }

    #[test]
    fn test_profile_form_checks_phone() {
        let form = ProfileForm {
            name: "Asha".to_string(),
            phone: Some("12345".to_string()),
            address: None,
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.get("phone").is_some());
    }
}
