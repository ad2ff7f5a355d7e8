//! Wishlist route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use souk_core::ProductId;

use crate::api::types::WishlistItem;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireSession, wants_bare_status};
use crate::models::toast::push_flash;
use crate::models::{HxTrigger, Toast};
use crate::routes::cart::CART_UNAVAILABLE;
use crate::routes::layout::{Layout, user_id};
use crate::services::cart_bootstrap::session_cart;
use crate::state::AppState;

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/index.html")]
pub struct WishlistTemplate {
    pub layout: Layout,
    pub items: Vec<WishlistItem>,
}

/// Wishlist form data.
#[derive(Debug, Deserialize)]
pub struct WishlistForm {
    pub product_id: String,
}

/// Answer an HTMX post with a toast, or a plain post with a flash and
/// redirect.
async fn respond(session: &Session, headers: &HeaderMap, toast: Toast, back: &str) -> Response {
    if wants_bare_status(headers) {
        HxTrigger::new().toast(&toast).into_headers().into_response()
    } else {
        push_flash(session, &toast).await;
        Redirect::to(back).into_response()
    }
}

/// Display the wishlist.
///
/// # Errors
///
/// Returns an error if the session has no account id or the token is
/// rejected.
#[instrument(skip(state, session, data))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
) -> Result<impl IntoResponse> {
    let user = user_id(&data)?;
    let items = match state.api().wishlist().list(&data.access_token, user).await {
        Ok(items) => items,
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to load wishlist");
            Vec::new()
        }
    };

    Ok(WishlistTemplate {
        layout: Layout::new(&session, Some(&data)).await,
        items,
    })
}

/// Add a product to the wishlist.
///
/// # Errors
///
/// Returns an error if the session has no account id or the token is
/// rejected.
#[instrument(skip(state, session, data, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    headers: HeaderMap,
    Form(form): Form<WishlistForm>,
) -> Result<Response> {
    let user = user_id(&data)?;
    let product_id = ProductId::new(form.product_id);
    let back = format!("/products/{product_id}");

    let toast = match state
        .api()
        .wishlist()
        .add(&data.access_token, user, &product_id)
        .await
    {
        Ok(()) => Toast::success("Saved to your wishlist"),
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(product_id = %product_id, error = %e, "Failed to add wishlist item");
            Toast::error(e.user_message())
        }
    };

    Ok(respond(&session, &headers, toast, &back).await)
}

/// Remove a product from the wishlist.
///
/// # Errors
///
/// Returns an error if the session has no account id or the token is
/// rejected.
#[instrument(skip(state, session, data))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Form(form): Form<WishlistForm>,
) -> Result<Response> {
    let user = user_id(&data)?;
    let product_id = ProductId::new(form.product_id);

    match state
        .api()
        .wishlist()
        .remove(&data.access_token, user, &product_id)
        .await
    {
        Ok(()) => push_flash(&session, &Toast::info("Removed from your wishlist")).await,
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(product_id = %product_id, error = %e, "Failed to remove wishlist item");
            push_flash(&session, &Toast::error(e.user_message())).await;
        }
    }
    Ok(Redirect::to("/wishlist").into_response())
}

/// Move a wishlist item into the cart.
///
/// The item only leaves the wishlist once the cart accepted it.
///
/// # Errors
///
/// Returns an error if the session has no account id or the token is
/// rejected.
#[instrument(skip(state, session, data))]
pub async fn move_to_cart(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Form(form): Form<WishlistForm>,
) -> Result<Response> {
    let user = user_id(&data)?;
    let product_id = ProductId::new(form.product_id);
    let api = state.api();

    let Some(cart_id) = session_cart(&session, api, &data.access_token).await else {
        push_flash(&session, &Toast::error(CART_UNAVAILABLE)).await;
        return Ok(Redirect::to("/wishlist").into_response());
    };

    if let Err(e) = api
        .carts()
        .add_line(&data.access_token, &cart_id, &product_id, 1)
        .await
    {
        if e.is_unauthorized() {
            return Err(AppError::from(e));
        }
        warn!(product_id = %product_id, error = %e, "Failed to move wishlist item to cart");
        push_flash(&session, &Toast::error(e.user_message())).await;
        return Ok(Redirect::to("/wishlist").into_response());
    }

    if let Err(e) = api
        .wishlist()
        .remove(&data.access_token, user, &product_id)
        .await
    {
        warn!(product_id = %product_id, error = %e, "Item added to cart but left on wishlist");
    }

    push_flash(&session, &Toast::success("Moved to your cart")).await;
    Ok(Redirect::to("/wishlist").into_response())
}
