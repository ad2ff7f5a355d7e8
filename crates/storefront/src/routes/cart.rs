//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart id is bootstrapped per session (see
//! [`crate::services::cart_bootstrap`]) and cached there.

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

use souk_core::{CartId, CartItemId, CurrencyCode, Price, ProductId};

use crate::api::types::{Cart, CartLine};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireSession, wants_bare_status};
use crate::models::toast::push_flash;
use crate::models::{HxTrigger, SessionData, Toast};
use crate::routes::layout::Layout;
use crate::services::cart_bootstrap::session_cart;
use crate::services::validation::cart_quantity;
use crate::state::AppState;

/// Shown when no cart id can be resolved.
pub const CART_UNAVAILABLE: &str = "Your cart is unavailable right now";

/// Cart item display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: rupees(rust_decimal::Decimal::ZERO).display(),
            item_count: 0,
        }
    }
}

// =============================================================================
// Type Conversions
// =============================================================================

const fn rupees(amount: rust_decimal::Decimal) -> Price {
    Price::new(amount, CurrencyCode::INR)
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items.iter().map(CartItemView::from).collect(),
            subtotal: rupees(cart.subtotal()).display(),
            item_count: cart.item_count(),
        }
    }
}

impl From<&CartLine> for CartItemView {
    fn from(line: &CartLine) -> Self {
        let price = rupees(line.unit_price);
        Self {
            id: line.id.to_string(),
            product_id: line.product_id.to_string(),
            name: line.name.clone(),
            image_url: line.image_url.clone(),
            quantity: line.quantity,
            price: price.display(),
            line_price: price.times(line.quantity).display(),
        }
    }
}

// =============================================================================
// Forms and Templates
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    /// Defaults to one when missing or blank.
    pub quantity: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: String,
    pub quantity: String,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Helpers
// =============================================================================

/// Fetch the cart, logging failures. Token rejections are passed up so the
/// session is cleared.
async fn fetch_cart(
    state: &AppState,
    data: &SessionData,
    cart_id: &CartId,
) -> Result<Option<Cart>, AppError> {
    match state.api().carts().get(&data.access_token, cart_id).await {
        Ok(cart) => Ok(Some(cart)),
        Err(e) if e.is_unauthorized() => Err(e.into()),
        Err(e) => {
            warn!(cart_id = %cart_id, error = %e, "Failed to fetch cart");
            Ok(None)
        }
    }
}

/// Re-render the items fragment from the service's state.
async fn items_fragment(
    state: &AppState,
    data: &SessionData,
    cart_id: &CartId,
    trigger: HxTrigger,
) -> Response {
    match fetch_cart(state, data, cart_id).await {
        Ok(cart) => {
            let cart = cart.as_ref().map_or_else(CartView::empty, CartView::from);
            (trigger.into_headers(), CartItemsTemplate { cart }).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Answer an add-to-cart post: badge fragment for HTMX, flash and redirect
/// otherwise. `count` is set when the cart changed.
async fn add_response(session: &Session, htmx: bool, toast: Toast, count: Option<u32>) -> Response {
    if !htmx {
        push_flash(session, &toast).await;
        return Redirect::to("/cart").into_response();
    }

    let mut trigger = HxTrigger::new().toast(&toast);
    if count.is_some() {
        trigger = trigger.event("cart-updated");
    }
    (
        trigger.into_headers(),
        CartCountTemplate {
            count: count.unwrap_or(0),
        },
    )
        .into_response()
}

fn unavailable_fragment() -> Response {
    (
        HxTrigger::new()
            .toast(&Toast::error(CART_UNAVAILABLE))
            .into_headers(),
        CartItemsTemplate {
            cart: CartView::empty(),
        },
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session, data))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
) -> Response {
    let Some(cart_id) = session_cart(&session, state.api(), &data.access_token).await else {
        return CartShowTemplate {
            layout: Layout::with_toast(&session, Some(&data), Toast::warning(CART_UNAVAILABLE))
                .await,
            cart: CartView::empty(),
        }
        .into_response();
    };

    match fetch_cart(&state, &data, &cart_id).await {
        Ok(cart) => CartShowTemplate {
            layout: Layout::new(&session, Some(&data)).await,
            cart: cart.as_ref().map_or_else(CartView::empty, CartView::from),
        }
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Add item to cart.
///
/// HTMX requests get the updated count badge with a `cart-updated` trigger
/// and a toast; plain form posts are redirected back to the cart.
#[instrument(skip(state, session, data, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let htmx = wants_bare_status(&headers);

    let requested = form
        .quantity
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or("1");
    let quantity = match cart_quantity(requested) {
        Ok(quantity) => quantity,
        Err(message) => return add_response(&session, htmx, Toast::warning(message), None).await,
    };

    let Some(cart_id) = session_cart(&session, state.api(), &data.access_token).await else {
        return add_response(&session, htmx, Toast::error(CART_UNAVAILABLE), None).await;
    };

    let product_id = ProductId::new(form.product_id);
    let carts = state.api().carts();
    match carts
        .add_line(&data.access_token, &cart_id, &product_id, quantity)
        .await
    {
        Ok(()) => {
            let count = match fetch_cart(&state, &data, &cart_id).await {
                Ok(cart) => cart.map_or(0, |c| c.item_count()),
                Err(e) => return e.into_response(),
            };
            add_response(&session, htmx, Toast::success("Added to cart"), Some(count)).await
        }
        Err(e) if e.is_unauthorized() => AppError::from(e).into_response(),
        Err(e) => {
            warn!(product_id = %product_id, error = %e, "Failed to add item to cart");
            add_response(&session, htmx, Toast::error(e.user_message()), None).await
        }
    }
}

/// Update cart item quantity (HTMX).
///
/// The quantity is validated before the service is called. On any failure
/// the fragment is rebuilt from the service's state and an error toast is
/// raised, undoing the optimistic change in the browser.
#[instrument(skip(state, session, data))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let Some(cart_id) = session_cart(&session, state.api(), &data.access_token).await else {
        return unavailable_fragment();
    };

    let quantity = match cart_quantity(&form.quantity) {
        Ok(quantity) => quantity,
        Err(message) => {
            let trigger = HxTrigger::new().toast(&Toast::warning(message));
            return items_fragment(&state, &data, &cart_id, trigger).await;
        }
    };

    let item_id = CartItemId::new(form.item_id);
    let result = state
        .api()
        .carts()
        .update_line(&data.access_token, &cart_id, &item_id, quantity)
        .await;

    let trigger = match result {
        Ok(()) => HxTrigger::new().event("cart-updated"),
        Err(e) if e.is_unauthorized() => return AppError::from(e).into_response(),
        Err(e) => {
            warn!(item_id = %item_id, error = %e, "Failed to update cart line");
            HxTrigger::new().toast(&Toast::error("Could not update quantity"))
        }
    };
    items_fragment(&state, &data, &cart_id, trigger).await
}

/// Remove item from cart (HTMX).
#[instrument(skip(state, session, data))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let Some(cart_id) = session_cart(&session, state.api(), &data.access_token).await else {
        return unavailable_fragment();
    };

    let item_id = CartItemId::new(form.item_id);
    let result = state
        .api()
        .carts()
        .remove_line(&data.access_token, &cart_id, &item_id)
        .await;

    let trigger = match result {
        Ok(()) => HxTrigger::new()
            .event("cart-updated")
            .toast(&Toast::info("Removed from cart")),
        Err(e) if e.is_unauthorized() => return AppError::from(e).into_response(),
        Err(e) => {
            warn!(item_id = %item_id, error = %e, "Failed to remove cart line");
            HxTrigger::new().toast(&Toast::error("Could not remove the item"))
        }
    };
    items_fragment(&state, &data, &cart_id, trigger).await
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session, data))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
) -> Response {
    let Some(cart_id) = session_cart(&session, state.api(), &data.access_token).await else {
        return CartCountTemplate { count: 0 }.into_response();
    };

    match fetch_cart(&state, &data, &cart_id).await {
        Ok(cart) => CartCountTemplate {
            count: cart.map_or(0, |c| c.item_count()),
        }
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_cart_view_totals() {
        let cart = Cart {
            id: CartId::new("c1"),
            items: vec![
                CartLine {
                    id: CartItemId::new("i1"),
                    product_id: ProductId::new("p1"),
                    name: "Kurta".to_string(),
                    image_url: None,
                    unit_price: Decimal::new(49950, 2),
                    quantity: 2,
                },
                CartLine {
                    id: CartItemId::new("i2"),
                    product_id: ProductId::new("p2"),
                    name: "Dupatta".to_string(),
                    image_url: None,
                    unit_price: Decimal::from(250),
                    quantity: 1,
                },
            ],
        };

        let view = CartView::from(&cart);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "₹1249.00");
        assert_eq!(view.items[0].line_price, "₹999.00");
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::empty();
        assert!(view.items.is_empty());
        assert_eq!(view.subtotal, "₹0.00");
    }
}
