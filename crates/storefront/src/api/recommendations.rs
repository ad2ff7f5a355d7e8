//! Recommendation service.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use souk_core::{ProductId, UserId};

use super::types::{ListBody, Product};
use super::{ApiClient, ApiError, Service};

/// Recommendation service facade.
pub struct RecommendationsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> RecommendationsApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Products picked for a signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn for_user(
        &self,
        token: &SecretString,
        user_id: &UserId,
    ) -> Result<Vec<Product>, ApiError> {
        let url = self.client.url(
            Service::Recommendations,
            &format!("/recommendations/user/{user_id}"),
            &[],
        )?;
        let request = self.client.request(Method::GET, url, Some(token));
        let body: ListBody<Product> = self
            .client
            .send_json(Service::Recommendations, request)
            .await?;
        Ok(body.into_items())
    }

    /// Products similar to `product_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn similar(&self, product_id: &ProductId) -> Result<Vec<Product>, ApiError> {
        let url = self.client.url(
            Service::Recommendations,
            &format!("/recommendations/product/{product_id}"),
            &[],
        )?;
        let request = self.client.request(Method::GET, url, None);
        let body: ListBody<Product> = self
            .client
            .send_json(Service::Recommendations, request)
            .await?;
        Ok(body.into_items())
    }
}
