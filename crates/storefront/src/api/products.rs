//! Product service: catalog, categories and moderation.
//!
//! Categories, subcategories and product detail are cached for 5 minutes.
//! Listings are not cached because they depend on filters and moderation
//! state.

use reqwest::Method;
use secrecy::SecretString;
use tracing::{debug, instrument};

use souk_core::{CategoryId, Page, PageRequest, ProductId, ProductStatus, StoreId, SubcategoryId};

use super::types::{Category, NewProduct, Product, StatusUpdate, Subcategory};
use super::{ApiClient, ApiError, Service};

/// Cached catalog values.
#[derive(Debug, Clone)]
pub enum CatalogCacheValue {
    Product(Box<Product>),
    Categories(Vec<Category>),
    Subcategories(Vec<Subcategory>),
}

/// Filters for the public product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    pub subcategory: Option<SubcategoryId>,
    pub store: Option<StoreId>,
    pub query: Option<String>,
}

impl ProductFilter {
    fn query_pairs(&self, page: PageRequest) -> Vec<(&'static str, String)> {
        vec![
            (
                "category",
                self.category.as_ref().map(ToString::to_string).unwrap_or_default(),
            ),
            (
                "subcategory",
                self.subcategory
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ),
            (
                "store",
                self.store.as_ref().map(ToString::to_string).unwrap_or_default(),
            ),
            ("q", self.query.clone().unwrap_or_default()),
            ("page", page.page.to_string()),
            ("limit", page.per_page.to_string()),
        ]
    }
}

/// Product service facade.
pub struct ProductsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ProductsApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Public, approved product listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, ApiError> {
        let url = self
            .client
            .url(Service::Products, "/products", &filter.query_pairs(page))?;
        let request = self.client.request(Method::GET, url, None);
        self.client.send_page(Service::Products, request, page).await
    }

    /// Product detail.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get(&self, id: &ProductId) -> Result<Product, ApiError> {
        let cache_key = format!("product:{id}");

        if let Some(CatalogCacheValue::Product(product)) =
            self.client.catalog_cache().get(&cache_key).await
        {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self
            .client
            .url(Service::Products, &format!("/products/{id}"), &[])?;
        let request = self.client.request(Method::GET, url, None);
        let product: Product = self.client.send_json(Service::Products, request).await?;

        self.client
            .catalog_cache()
            .insert(cache_key, CatalogCacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Submit a new listing for moderation.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the listing.
    #[instrument(skip(self, token, product), fields(store_id = %product.store_id))]
    pub async fn create(
        &self,
        token: &SecretString,
        product: &NewProduct,
    ) -> Result<Option<Product>, ApiError> {
        let url = self.client.url(Service::Products, "/products", &[])?;
        let request = self
            .client
            .request(Method::POST, url, Some(token))
            .json(product);
        self.client.send_optional(Service::Products, request).await
    }

    /// Every product currently in `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token))]
    pub async fn list_by_status(
        &self,
        token: &SecretString,
        status: ProductStatus,
    ) -> Result<Vec<Product>, ApiError> {
        let url = self.client.url(
            Service::Products,
            &format!("/products/status/{status}"),
            &[],
        )?;
        let request = self.client.request(Method::GET, url, Some(token));
        let body: super::types::ListBody<Product> =
            self.client.send_json(Service::Products, request).await?;
        Ok(body.into_items())
    }

    /// Move a product to `status`. Returns the updated product when the
    /// service answers with one.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn update_status(
        &self,
        token: &SecretString,
        id: &ProductId,
        status: ProductStatus,
    ) -> Result<Option<Product>, ApiError> {
        let url = self.client.url(
            Service::Products,
            &format!("/products/{id}/status"),
            &[],
        )?;
        let request = self
            .client
            .request(Method::PATCH, url, Some(token))
            .json(&StatusUpdate { status });
        let updated = self.client.send_optional(Service::Products, request).await?;
        self.invalidate(id).await;
        Ok(updated)
    }

    /// A store's products in every moderation state.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self, token), fields(store_id = %store_id))]
    pub async fn list_for_store(
        &self,
        token: &SecretString,
        store_id: &StoreId,
        page: PageRequest,
    ) -> Result<Page<Product>, ApiError> {
        let url = self.client.url(
            Service::Products,
            &format!("/products/store/{store_id}"),
            &[
                ("page", page.page.to_string()),
                ("limit", page.per_page.to_string()),
            ],
        )?;
        let request = self.client.request(Method::GET, url, Some(token));
        self.client.send_page(Service::Products, request, page).await
    }

    /// Top-level categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let cache_key = "categories".to_string();

        if let Some(CatalogCacheValue::Categories(categories)) =
            self.client.catalog_cache().get(&cache_key).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let url = self.client.url(Service::Products, "/categories", &[])?;
        let request = self.client.request(Method::GET, url, None);
        let body: super::types::ListBody<Category> =
            self.client.send_json(Service::Products, request).await?;
        let categories = body.into_items();

        self.client
            .catalog_cache()
            .insert(cache_key, CatalogCacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Subcategories of a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn subcategories(
        &self,
        category_id: &CategoryId,
    ) -> Result<Vec<Subcategory>, ApiError> {
        let cache_key = format!("subcategories:{category_id}");

        if let Some(CatalogCacheValue::Subcategories(subcategories)) =
            self.client.catalog_cache().get(&cache_key).await
        {
            debug!("Cache hit for subcategories");
            return Ok(subcategories);
        }

        let url = self.client.url(
            Service::Products,
            &format!("/categories/{category_id}/subcategories"),
            &[],
        )?;
        let request = self.client.request(Method::GET, url, None);
        let body: super::types::ListBody<Subcategory> =
            self.client.send_json(Service::Products, request).await?;
        let subcategories = body.into_items();

        self.client
            .catalog_cache()
            .insert(
                cache_key,
                CatalogCacheValue::Subcategories(subcategories.clone()),
            )
            .await;

        Ok(subcategories)
    }

    /// Drop a cached product after it changed.
    pub async fn invalidate(&self, id: &ProductId) {
        self.client
            .catalog_cache()
            .invalidate(&format!("product:{id}"))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_pairs() {
        let filter = ProductFilter {
            category: Some(CategoryId::new("c1")),
            subcategory: None,
            store: None,
            query: Some("saree".to_string()),
        };
        let pairs = filter.query_pairs(PageRequest::new(2, 12));
        assert!(pairs.contains(&("category", "c1".to_string())));
        assert!(pairs.contains(&("subcategory", String::new())));
        assert!(pairs.contains(&("q", "saree".to_string())));
        assert!(pairs.contains(&("page", "2".to_string())));
        assert!(pairs.contains(&("limit", "12".to_string())));
    }
}
