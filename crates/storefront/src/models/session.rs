//! Session-related types.
//!
//! Types stored in the browser session for authentication state.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use souk_core::{Role, UserId};

use crate::api::types::LoginResponse;
use crate::services::token::decode_token;

/// Authentication state of a signed-in browser.
///
/// Present in the session exactly when the browser is signed in. The tokens
/// are redacted from `Debug` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Bearer token sent to the services.
    #[serde(with = "secret_string")]
    pub access_token: SecretString,
    /// Refresh token, when the auth service issued one.
    #[serde(default, with = "option_secret_string")]
    pub refresh_token: Option<SecretString>,
    /// Role the account acts under.
    pub role: Role,
    /// Account id decoded from the access token.
    pub user_id: Option<UserId>,
    /// Email used to sign in.
    pub email: String,
    /// Name shown in the header.
    pub display_name: String,
    /// Token expiry, informational only.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionData {
    /// Build the session state from a successful login.
    ///
    /// The role comes from the login response, then the user summary, then
    /// the token's role claim, defaulting to customer.
    #[must_use]
    pub fn from_login(response: LoginResponse, email: &str) -> Self {
        let claims = decode_token(&response.access_token);

        let role = response
            .role
            .or_else(|| response.user.as_ref().map(|u| u.role))
            .or_else(|| claims.as_ref().and_then(|c| c.role))
            .unwrap_or(Role::Customer);

        let user_id = response
            .user
            .as_ref()
            .map(|u| u.id.clone())
            .or_else(|| claims.as_ref().map(|c| c.subject.clone()));

        let display_name = response
            .user
            .as_ref()
            .map(|u| u.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

        Self {
            access_token: SecretString::from(response.access_token),
            refresh_token: response.refresh_token.map(SecretString::from),
            role,
            user_id,
            email: email.to_string(),
            display_name,
            expires_at: claims.and_then(|c| c.expires_at),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Authentication state ([`super::SessionData`]).
    pub const SESSION_DATA: &str = "session_data";

    /// Identifier of the customer's cart.
    pub const CART_ID: &str = "cart_id";

    /// Vendor onboarding wizard draft.
    pub const ONBOARDING_DRAFT: &str = "onboarding_draft";

    /// One-shot toast shown on the next full page.
    pub const FLASH: &str = "flash";

    /// Key of this browser's notification feed.
    pub const NOTIFICATION_FEED: &str = "notification_feed";

    /// Email awaiting signup OTP verification.
    pub const PENDING_SIGNUP: &str = "pending_signup";

    /// Email awaiting a password reset code.
    pub const PENDING_RESET: &str = "pending_reset";

    /// Prefix of cached approval boards, followed by the board name.
    pub const APPROVAL_PREFIX: &str = "approval:";
}

mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

mod option_secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<SecretString>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(secret) => serializer.serialize_some(secret.expose_secret()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SecretString>, D::Error> {
        Option::<String>::deserialize(deserializer).map(|v| v.map(SecretString::from))
    }
}
