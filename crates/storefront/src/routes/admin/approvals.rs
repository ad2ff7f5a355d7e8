//! Admin approval boards for products, stores and orders.

use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::types::{Order, Product, Store};
use crate::error::Result;
use crate::middleware::RequireSession;
use crate::routes::board::{BoardQuery, BoardSpec, StatusForm, board_page, change_status};
use crate::routes::layout::Layout;
use crate::state::AppState;

const PRODUCTS: BoardSpec = BoardSpec {
    name: "admin_products",
    heading: "Product approvals",
    path: "/admin/products",
};

const STORES: BoardSpec = BoardSpec {
    name: "admin_stores",
    heading: "Store approvals",
    path: "/admin/stores",
};

const ORDERS: BoardSpec = BoardSpec {
    name: "admin_orders",
    heading: "Orders",
    path: "/admin/orders",
};

// =============================================================================
// Products
// =============================================================================

#[instrument(skip(state, session, data))]
pub async fn products(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Query(query): Query<BoardQuery>,
) -> Response {
    let products = state.api().products();
    let token = &data.access_token;
    let layout = Layout::new(&session, Some(&data)).await;

    board_page::<Product, _, _>(&session, layout, PRODUCTS, &query, |status| {
        products.list_by_status(token, status)
    })
    .await
}

/// Approve, reject or re-queue a product. The cached copy of the product
/// page is dropped so shoppers see the new status.
///
/// # Errors
///
/// Returns an error if the token is rejected.
#[instrument(skip(state, session, data, headers))]
pub async fn product_status(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    headers: HeaderMap,
    Form(form): Form<StatusForm>,
) -> Result<Response> {
    let products = state.api().products();
    let token = &data.access_token;

    change_status::<Product, _, _>(&session, &headers, PRODUCTS, form, move |id, status| async move {
        let updated = products.update_status(token, &id, status).await;
        if updated.is_ok() {
            products.invalidate(&id).await;
        }
        updated
    })
    .await
}

// =============================================================================
// Stores
// =============================================================================

#[instrument(skip(state, session, data))]
pub async fn stores(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Query(query): Query<BoardQuery>,
) -> Response {
    let stores = state.api().stores();
    let token = &data.access_token;
    let layout = Layout::new(&session, Some(&data)).await;

    board_page::<Store, _, _>(&session, layout, STORES, &query, |status| {
        stores.list_by_status(token, status)
    })
    .await
}

/// # Errors
///
/// Returns an error if the token is rejected.
#[instrument(skip(state, session, data, headers))]
pub async fn store_status(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    headers: HeaderMap,
    Form(form): Form<StatusForm>,
) -> Result<Response> {
    let stores = state.api().stores();
    let token = &data.access_token;

    change_status::<Store, _, _>(&session, &headers, STORES, form, move |id, status| async move {
        stores.update_status(token, &id, status).await
    })
    .await
}

// =============================================================================
// Orders
// =============================================================================

#[instrument(skip(state, session, data))]
pub async fn orders(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Query(query): Query<BoardQuery>,
) -> Response {
    let orders = state.api().orders();
    let token = &data.access_token;
    let layout = Layout::new(&session, Some(&data)).await;

    board_page::<Order, _, _>(&session, layout, ORDERS, &query, |status| {
        orders.all(token, status)
    })
    .await
}

/// # Errors
///
/// Returns an error if the token is rejected.
#[instrument(skip(state, session, data, headers))]
pub async fn order_status(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    headers: HeaderMap,
    Form(form): Form<StatusForm>,
) -> Result<Response> {
    let orders = state.api().orders();
    let token = &data.access_token;

    change_status::<Order, _, _>(&session, &headers, ORDERS, form, move |id, status| async move {
        orders.update_status(token, &id, status).await
    })
    .await
}
