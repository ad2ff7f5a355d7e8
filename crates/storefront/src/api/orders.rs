//! Order service: history, detail and fulfilment.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use souk_core::{OrderId, OrderStatus, Page, PageRequest, StoreId, UserId};

use super::types::{ListBody, Order, StatusUpdate};
use super::{ApiClient, ApiError, Service};

/// Order service facade.
pub struct OrdersApi<'a> {
    client: &'a ApiClient,
}

impl<'a> OrdersApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn for_user(
        &self,
        token: &SecretString,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<Page<Order>, ApiError> {
        let url = self.client.url(
            Service::Orders,
            &format!("/orders/user/{user_id}"),
            &[
                ("page", page.page.to_string()),
                ("limit", page.per_page.to_string()),
            ],
        )?;
        let request = self.client.request(Method::GET, url, Some(token));
        self.client.send_page(Service::Orders, request, page).await
    }

    /// Order detail.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn get(&self, token: &SecretString, id: &OrderId) -> Result<Order, ApiError> {
        let url = self
            .client
            .url(Service::Orders, &format!("/orders/{id}"), &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        self.client.send_json(Service::Orders, request).await
    }

    /// A store's orders in `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(store_id = %store_id))]
    pub async fn for_store(
        &self,
        token: &SecretString,
        store_id: &StoreId,
        status: OrderStatus,
    ) -> Result<Vec<Order>, ApiError> {
        let url = self.client.url(
            Service::Orders,
            &format!("/orders/store/{store_id}"),
            &[("status", status.as_str().to_string())],
        )?;
        let request = self.client.request(Method::GET, url, Some(token));
        let body: ListBody<Order> = self.client.send_json(Service::Orders, request).await?;
        Ok(body.into_items())
    }

    /// Every order on the marketplace in `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token))]
    pub async fn all(
        &self,
        token: &SecretString,
        status: OrderStatus,
    ) -> Result<Vec<Order>, ApiError> {
        let url = self.client.url(
            Service::Orders,
            "/orders",
            &[("status", status.as_str().to_string())],
        )?;
        let request = self.client.request(Method::GET, url, Some(token));
        let body: ListBody<Order> = self.client.send_json(Service::Orders, request).await?;
        Ok(body.into_items())
    }

    /// Move an order to `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn update_status(
        &self,
        token: &SecretString,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, ApiError> {
        let url = self
            .client
            .url(Service::Orders, &format!("/orders/{id}/status"), &[])?;
        let request = self
            .client
            .request(Method::PATCH, url, Some(token))
            .json(&StatusUpdate { status });
        self.client.send_optional(Service::Orders, request).await
    }
}
