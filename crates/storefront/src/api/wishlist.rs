//! Wishlist service.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use souk_core::{ProductId, UserId};

use super::types::{AddWishlistItem, ListBody, WishlistItem};
use super::{ApiClient, ApiError, Service};

/// Wishlist service facade.
pub struct WishlistApi<'a> {
    client: &'a ApiClient,
}

impl<'a> WishlistApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Saved products.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn list(
        &self,
        token: &SecretString,
        user_id: &UserId,
    ) -> Result<Vec<WishlistItem>, ApiError> {
        let url = self
            .client
            .url(Service::Wishlist, &format!("/wishlist/{user_id}"), &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        let body: Option<ListBody<WishlistItem>> =
            self.client.send_optional(Service::Wishlist, request).await?;
        Ok(body.map(ListBody::into_items).unwrap_or_default())
    }

    /// Save a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add(
        &self,
        token: &SecretString,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let url = self.client.url(Service::Wishlist, "/wishlist", &[])?;
        let request = self
            .client
            .request(Method::POST, url, Some(token))
            .json(&AddWishlistItem {
                user_id,
                product_id,
            });
        self.client.send_empty(Service::Wishlist, request).await
    }

    /// Remove a saved product.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove(
        &self,
        token: &SecretString,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let url = self.client.url(
            Service::Wishlist,
            &format!("/wishlist/{user_id}/{product_id}"),
            &[],
        )?;
        let request = self.client.request(Method::DELETE, url, Some(token));
        self.client.send_empty(Service::Wishlist, request).await
    }
}
