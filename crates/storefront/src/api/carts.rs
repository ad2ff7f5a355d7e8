//! Cart service. Cart contents are never cached; they are mutable state.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use souk_core::{CartId, CartItemId, ProductId, UserId};

use super::types::{AddCartLine, Cart, CartLookup, CreateCartRequest, UpdateCartLine};
use super::{ApiClient, ApiError, Service};

/// Cart service facade.
pub struct CartsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> CartsApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// The cart id for a user, `None` when the user has no cart yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails. A 404 is reported as
    /// `Ok(None)`.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn find_for_user(
        &self,
        token: &SecretString,
        user_id: &UserId,
    ) -> Result<Option<CartId>, ApiError> {
        let url = self
            .client
            .url(Service::Carts, &format!("/carts/user/{user_id}"), &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        match self
            .client
            .send_optional::<CartLookup>(Service::Carts, request)
            .await
        {
            Ok(lookup) => Ok(lookup.and_then(|l| l.cart_id)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create an empty cart for a user and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails or answers without an id.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn create(&self, token: &SecretString, user_id: &UserId) -> Result<CartId, ApiError> {
        let url = self.client.url(Service::Carts, "/carts", &[])?;
        let request = self
            .client
            .request(Method::POST, url, Some(token))
            .json(&CreateCartRequest { user_id });
        let lookup: CartLookup = self.client.send_json(Service::Carts, request).await?;
        lookup.cart_id.ok_or_else(|| ApiError::Decode {
            service: Service::Carts,
            message: "create cart response has no id".to_string(),
        })
    }

    /// Cart contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(cart_id = %cart_id))]
    pub async fn get(&self, token: &SecretString, cart_id: &CartId) -> Result<Cart, ApiError> {
        let url = self
            .client
            .url(Service::Carts, &format!("/carts/{cart_id}"), &[])?;
        let request = self.client.request(Method::GET, url, Some(token));
        self.client.send_json(Service::Carts, request).await
    }

    /// Add a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(cart_id = %cart_id, product_id = %product_id))]
    pub async fn add_line(
        &self,
        token: &SecretString,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let url = self
            .client
            .url(Service::Carts, &format!("/carts/{cart_id}/items"), &[])?;
        let request = self
            .client
            .request(Method::POST, url, Some(token))
            .json(&AddCartLine {
                product_id,
                quantity,
            });
        self.client.send_empty(Service::Carts, request).await
    }

    /// Change a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(cart_id = %cart_id, item_id = %item_id))]
    pub async fn update_line(
        &self,
        token: &SecretString,
        cart_id: &CartId,
        item_id: &CartItemId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let url = self.client.url(
            Service::Carts,
            &format!("/carts/{cart_id}/items/{item_id}"),
            &[],
        )?;
        let request = self
            .client
            .request(Method::PATCH, url, Some(token))
            .json(&UpdateCartLine { quantity });
        self.client.send_empty(Service::Carts, request).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(cart_id = %cart_id, item_id = %item_id))]
    pub async fn remove_line(
        &self,
        token: &SecretString,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> Result<(), ApiError> {
        let url = self.client.url(
            Service::Carts,
            &format!("/carts/{cart_id}/items/{item_id}"),
            &[],
        )?;
        let request = self.client.request(Method::DELETE, url, Some(token));
        self.client.send_empty(Service::Carts, request).await
    }
}
