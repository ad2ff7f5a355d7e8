//! Store service: vendor stores, onboarding and sales dashboards.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use souk_core::{Page, PageRequest, StoreId, StoreStatus, UserId};

use super::types::{ListBody, SalesDashboard, StatusUpdate, Store, StoreApplication};
use super::{ApiClient, ApiError, Service};

/// Store service facade.
pub struct StoresApi<'a> {
    client: &'a ApiClient,
}

impl<'a> StoresApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Public store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self))]
    pub async fn list(&self, page: PageRequest) -> Result<Page<Store>, ApiError> {
        let url = self.client.url(
            Service::Stores,
            "/stores",
            &[
                ("page", page.page.to_string()),
                ("limit", page.per_page.to_string()),
            ],
        )?;
        let request = self.client.request(Method::GET, url, None);
        self.client.send_page(Service::Stores, request, page).await
    }

    /// Store detail.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the store does not exist.
    #[instrument(skip(self), fields(store_id = %id))]
    pub async fn get(&self, id: &StoreId) -> Result<Store, ApiError> {
        let url = self
            .client
            .url(Service::Stores, &format!("/stores/{id}"), &[])?;
        let request = self.client.request(Method::GET, url, None);
        self.client.send_json(Service::Stores, request).await
    }

    /// Submit a vendor onboarding application.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the application.
    #[instrument(skip(self, token, application), fields(owner_id = %application.owner_id))]
    pub async fn apply(
        &self,
        token: &SecretString,
        application: &StoreApplication,
    ) -> Result<Option<Store>, ApiError> {
        let url = self.client.url(Service::Stores, "/stores", &[])?;
        let request = self
            .client
            .request(Method::POST, url, Some(token))
            .json(application);
        self.client.send_optional(Service::Stores, request).await
    }

    /// The store owned by `owner`, `None` before onboarding.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails. A 404 is `Ok(None)`.
    #[instrument(skip(self, token), fields(owner_id = %owner))]
    pub async fn owned_by(
        &self,
        token: &SecretString,
        owner: &UserId,
    ) -> Result<Option<Store>, ApiError> {
        let url = self
            .client
            .url(Service::Stores, &format!("/stores/owner/{owner}"), &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        match self.client.send_optional(Service::Stores, request).await {
            Err(ApiError::NotFound(_)) => Ok(None),
            other => other,
        }
    }

    /// Every store currently in `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token))]
    pub async fn list_by_status(
        &self,
        token: &SecretString,
        status: StoreStatus,
    ) -> Result<Vec<Store>, ApiError> {
        let url = self
            .client
            .url(Service::Stores, &format!("/stores/status/{status}"), &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        let body: ListBody<Store> = self.client.send_json(Service::Stores, request).await?;
        Ok(body.into_items())
    }

    /// Move a store to `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(store_id = %id))]
    pub async fn update_status(
        &self,
        token: &SecretString,
        id: &StoreId,
        status: StoreStatus,
    ) -> Result<Option<Store>, ApiError> {
        let url = self
            .client
            .url(Service::Stores, &format!("/stores/{id}/status"), &[])?;
        let request = self
            .client
            .request(Method::PATCH, url, Some(token))
            .json(&StatusUpdate { status });
        self.client.send_optional(Service::Stores, request).await
    }

    /// Sales summary for a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(store_id = %id))]
    pub async fn dashboard(
        &self,
        token: &SecretString,
        id: &StoreId,
    ) -> Result<SalesDashboard, ApiError> {
        let url = self
            .client
            .url(Service::Stores, &format!("/stores/{id}/dashboard"), &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        self.client.send_json(Service::Stores, request).await
    }
}
