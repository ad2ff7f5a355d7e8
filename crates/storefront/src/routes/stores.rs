//! Public store directory.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use souk_core::{Page, PageRequest, StoreId, StoreStatus};

use crate::api::types::{Product, Store};
use crate::api::{ApiError, ProductFilter};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::OptionalSession;
use crate::routes::layout::{Layout, PageNav};
use crate::state::AppState;

const STORES_PAGE_SIZE: u32 = 12;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Template, WebTemplate)]
#[template(path = "stores/index.html")]
pub struct StoresIndexTemplate {
    pub layout: Layout,
    pub stores: Vec<Store>,
    pub nav: PageNav,
}

#[derive(Template, WebTemplate)]
#[template(path = "stores/show.html")]
pub struct StoreShowTemplate {
    pub layout: Layout,
    pub store: Store,
    pub products: Vec<Product>,
    pub nav: PageNav,
}

/// List approved stores.
#[instrument(skip(state, session, viewer))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalSession(viewer): OptionalSession,
    Query(query): Query<PageQuery>,
) -> impl IntoResponse {
    let request = PageRequest::new(query.page.unwrap_or(1), STORES_PAGE_SIZE);
    let page = state.api().stores().list(request).await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load stores");
        Page::empty(request)
    });
    let nav = PageNav::new(&page, "/stores", &[]);

    StoresIndexTemplate {
        layout: Layout::new(&session, viewer.as_ref()).await,
        stores: page
            .items
            .into_iter()
            .filter(|s| s.status == StoreStatus::Approved)
            .collect(),
        nav,
    }
}

/// A store and its listed products.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the store does not exist.
#[instrument(skip(state, session, viewer), fields(store_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalSession(viewer): OptionalSession,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let id = StoreId::new(id);
    let request = PageRequest::new(query.page.unwrap_or(1), STORES_PAGE_SIZE);
    let filter = ProductFilter {
        store: Some(id.clone()),
        ..ProductFilter::default()
    };
    let api = state.api();
    let (store_api, product_api) = (api.stores(), api.products());

    let (store, products) = tokio::join!(store_api.get(&id), product_api.list(&filter, request));

    let store = match store {
        Ok(store) => store,
        Err(ApiError::NotFound(_)) => return Err(AppError::NotFound(format!("store {id}"))),
        Err(e) => return Err(e.into()),
    };
    let products = products.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load store products");
        Page::empty(request)
    });
    let nav = PageNav::new(&products, &format!("/stores/{id}"), &[]);

    Ok(StoreShowTemplate {
        layout: Layout::new(&session, viewer.as_ref()).await,
        store,
        products: products.items,
        nav,
    })
}
