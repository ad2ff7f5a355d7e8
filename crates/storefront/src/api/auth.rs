//! Auth service: login, registration, OTP, password reset, profiles, users.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use souk_core::{Page, PageRequest, Role};

use super::types::{
    LoginRequest, LoginResponse, OtpPurpose, Profile, ProfileUpdate, RegisterRequest,
    ResetPasswordRequest, SendOtpRequest, UserCounts, UserSummary, VerifyOtpRequest,
    VerifyOtpResponse,
};
use super::{ApiClient, ApiError, Service};

/// Auth service facade.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Exchange credentials for tokens.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for wrong credentials, or another
    /// error if the service call fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.client.url(Service::Auth, "/auth/login", &[])?;
        let request = self
            .client
            .request(Method::POST, url, None)
            .json(&LoginRequest { email, password });
        self.client.send_json(Service::Auth, request).await
    }

    /// Create an account. The account is usable once its email OTP is verified.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the registration.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<(), ApiError> {
        let url = self.client.url(Service::Auth, "/auth/register", &[])?;
        let request = self.client.request(Method::POST, url, None).json(&RegisterRequest {
            name,
            email,
            password,
            role,
        });
        self.client.send_empty(Service::Auth, request).await
    }

    /// Email a one-time code.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self))]
    pub async fn send_otp(&self, email: &str, purpose: OtpPurpose) -> Result<(), ApiError> {
        let url = self.client.url(Service::Auth, "/auth/otp/send", &[])?;
        let request = self
            .client
            .request(Method::POST, url, None)
            .json(&SendOtpRequest { email, purpose });
        self.client.send_empty(Service::Auth, request).await
    }

    /// Check a one-time code. Returns whether the service accepted it.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<bool, ApiError> {
        let url = self.client.url(Service::Auth, "/auth/otp/verify", &[])?;
        let request = self
            .client
            .request(Method::POST, url, None)
            .json(&VerifyOtpRequest { email, otp });
        let response: Option<VerifyOtpResponse> =
            self.client.send_optional(Service::Auth, request).await?;
        Ok(response.is_none_or(|r| r.verified))
    }

    /// Set a new password using an emailed code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is rejected or the call fails.
    #[instrument(skip(self, otp, new_password))]
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let url = self.client.url(Service::Auth, "/auth/password/reset", &[])?;
        let request = self
            .client
            .request(Method::POST, url, None)
            .json(&ResetPasswordRequest {
                email,
                otp,
                new_password,
            });
        self.client.send_empty(Service::Auth, request).await
    }

    /// The signed-in account's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip_all)]
    pub async fn profile(&self, token: &SecretString) -> Result<Profile, ApiError> {
        let url = self.client.url(Service::Auth, "/auth/profile", &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        self.client.send_json(Service::Auth, request).await
    }

    /// Update the signed-in account's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip_all)]
    pub async fn update_profile(
        &self,
        token: &SecretString,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, ApiError> {
        let url = self.client.url(Service::Auth, "/auth/profile", &[])?;
        let request = self.client.request(Method::PUT, url, Some(token)).json(update);
        self.client.send_optional(Service::Auth, request).await
    }

    /// Registered accounts per role.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip_all)]
    pub async fn user_counts(&self, token: &SecretString) -> Result<UserCounts, ApiError> {
        let url = self.client.url(Service::Auth, "/auth/users/count", &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        self.client.send_json(Service::Auth, request).await
    }

    /// Page through accounts, optionally restricted to one role.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token))]
    pub async fn users(
        &self,
        token: &SecretString,
        role: Option<Role>,
        page: PageRequest,
    ) -> Result<Page<UserSummary>, ApiError> {
        let url = self.client.url(
            Service::Auth,
            "/auth/users",
            &[
                ("role", role.map(|r| r.as_str().to_string()).unwrap_or_default()),
                ("page", page.page.to_string()),
                ("limit", page.per_page.to_string()),
            ],
        )?;
        let request = self.client.request(Method::GET, url, Some(token));
        self.client.send_page(Service::Auth, request, page).await
    }
}
