//! Catalog route handlers: product listing, product detail and the
//! subcategory picker fragment.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use souk_core::{CategoryId, Page, PageRequest, ProductId, Role, SubcategoryId};

use crate::api::types::{Category, Product, Store, Subcategory};
use crate::api::{ApiError, ProductFilter};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::OptionalSession;
use crate::routes::layout::{Layout, PageNav};
use crate::state::AppState;

/// Products per catalog page.
const CATALOG_PAGE_SIZE: u32 = 12;

/// Catalog query parameters. Empty values mean "no filter".
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl CatalogQuery {
    fn filter(&self) -> ProductFilter {
        ProductFilter {
            category: non_empty(self.category.as_ref()).map(CategoryId::new),
            subcategory: non_empty(self.subcategory.as_ref()).map(SubcategoryId::new),
            store: None,
            query: non_empty(self.q.as_ref()).map(str::to_string),
        }
    }
}

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub categories: Vec<Category>,
    pub subcategories: Vec<Subcategory>,
    pub products: Vec<Product>,
    pub total: u64,
    pub nav: PageNav,
    pub selected_category: String,
    pub selected_subcategory: String,
    pub search: String,
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: Product,
    pub store: Option<Store>,
    pub similar: Vec<Product>,
    pub can_buy: bool,
}

/// Subcategory `<option>` list fragment (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/subcategory_options.html")]
pub struct SubcategoryOptionsTemplate {
    pub subcategories: Vec<Subcategory>,
    pub selected: String,
}

/// Display the product catalog.
#[instrument(skip(state, session, viewer))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalSession(viewer): OptionalSession,
    Query(query): Query<CatalogQuery>,
) -> impl IntoResponse {
    let filter = query.filter();
    let page_request = PageRequest::new(query.page.unwrap_or(1), CATALOG_PAGE_SIZE);
    let products = state.api().products();

    let (categories, subcategories, page) = tokio::join!(
        products.categories(),
        async {
            match &filter.category {
                Some(category) => products.subcategories(category).await,
                None => Ok(Vec::new()),
            }
        },
        products.list(&filter, page_request),
    );

    let categories = categories.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load categories");
        Vec::new()
    });
    let subcategories = subcategories.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load subcategories");
        Vec::new()
    });
    let page: Page<Product> = page.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load products");
        Page::empty(page_request)
    });

    let selected_category = filter
        .category
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    let selected_subcategory = filter
        .subcategory
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    let search = filter.query.clone().unwrap_or_default();

    let nav = PageNav::new(
        &page,
        "/products",
        &[
            ("category", selected_category.as_str()),
            ("subcategory", selected_subcategory.as_str()),
            ("q", search.as_str()),
        ],
    );

    ProductsIndexTemplate {
        layout: Layout::new(&session, viewer.as_ref()).await,
        categories,
        subcategories,
        total: page.total,
        products: page.items,
        nav,
        selected_category,
        selected_subcategory,
        search,
    }
}

/// Display a product with its store and similar products.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the product does not exist.
#[instrument(skip(state, session, viewer), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalSession(viewer): OptionalSession,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = ProductId::new(id);
    let api = state.api();
    let (product_api, recommendations) = (api.products(), api.recommendations());

    let (product, similar) = tokio::join!(product_api.get(&id), recommendations.similar(&id));

    let product = match product {
        Ok(product) => product,
        Err(ApiError::NotFound(_)) => return Err(AppError::NotFound(format!("product {id}"))),
        Err(e) => return Err(e.into()),
    };

    let similar = similar
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load similar products");
            Vec::new()
        })
        .into_iter()
        .filter(|p| p.id != product.id)
        .collect();

    let store = match &product.store_id {
        Some(store_id) => api
            .stores()
            .get(store_id)
            .await
            .map_err(|e| warn!(error = %e, "Failed to load product store"))
            .ok(),
        None => None,
    };

    // Anyone signed out sees the buttons and is sent to login on click.
    let can_buy = viewer.as_ref().is_none_or(|v| v.role == Role::Customer);

    Ok(ProductShowTemplate {
        layout: Layout::new(&session, viewer.as_ref()).await,
        product,
        store,
        similar,
        can_buy,
    })
}

/// Subcategory options for a category (HTMX).
#[derive(Debug, Deserialize)]
pub struct SubcategoryQuery {
    #[serde(alias = "category_id")]
    pub category: Option<String>,
    pub selected: Option<String>,
}

/// Render the subcategory `<option>` list for the chosen category.
#[instrument(skip(state))]
pub async fn subcategory_options(
    State(state): State<AppState>,
    Query(query): Query<SubcategoryQuery>,
) -> impl IntoResponse {
    let subcategories = match non_empty(query.category.as_ref()) {
        Some(category) => state
            .api()
            .products()
            .subcategories(&CategoryId::new(category))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load subcategories");
                Vec::new()
            }),
        None => Vec::new(),
    };

    SubcategoryOptionsTemplate {
        subcategories,
        selected: query.selected.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_values_are_not_filters() {
        let query = CatalogQuery {
            category: Some(String::new()),
            subcategory: Some("  ".to_string()),
            q: Some(" silk ".to_string()),
            page: None,
        };
        let filter = query.filter();
        assert_eq!(filter.category, None);
        assert_eq!(filter.subcategory, None);
        assert_eq!(filter.query.as_deref(), Some("silk"));
    }
}
