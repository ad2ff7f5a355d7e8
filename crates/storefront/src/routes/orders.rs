//! Customer order tracking.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use souk_core::{OrderId, OrderStatus, Page, PageRequest};

use crate::api::ApiError;
use crate::api::types::Order;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::layout::{Layout, PageNav, user_id};
use crate::state::AppState;

const ORDERS_PAGE_SIZE: u32 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub page: Option<u32>,
}

/// One step of the status timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineStep {
    pub label: &'static str,
    pub reached: bool,
    pub current: bool,
}

/// Happy-path timeline for an order. Cancelled orders have none; the page
/// shows the cancellation instead.
#[must_use]
pub fn timeline(status: OrderStatus) -> Vec<TimelineStep> {
    let Some(position) = status.timeline_index() else {
        return Vec::new();
    };
    OrderStatus::TIMELINE
        .iter()
        .enumerate()
        .map(|(index, step)| TimelineStep {
            label: step.label(),
            reached: index <= position,
            current: index == position,
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub layout: Layout,
    pub orders: Vec<Order>,
    pub nav: PageNav,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: Layout,
    pub order: Order,
    pub timeline: Vec<TimelineStep>,
    pub cancelled: bool,
}

/// The signed-in customer's orders.
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
    Query(query): Query<OrdersQuery>,
) -> Result<impl IntoResponse> {
    let user = user_id(&data)?;
    let request = PageRequest::new(query.page.unwrap_or(1), ORDERS_PAGE_SIZE);

    let page = match state
        .api()
        .orders()
        .for_user(&data.access_token, user, request)
        .await
    {
        Ok(page) => page,
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to load orders");
            Page::empty(request)
        }
    };
    let nav = PageNav::new(&page, "/orders", &[]);

    Ok(OrdersIndexTemplate {
        layout: Layout::new(&session, Some(&data)).await,
        orders: page.items,
        nav,
    })
}

/// One order with its status timeline.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the order does not exist or belongs to
/// another account.
#[instrument(skip(state, session, data), fields(order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = OrderId::new(id);
    let order = match state.api().orders().get(&data.access_token, &id).await {
        Ok(order) => order,
        Err(ApiError::NotFound(_)) => return Err(AppError::NotFound(format!("order {id}"))),
        Err(e) => return Err(e.into()),
    };

    if let (Some(owner), Some(user)) = (&order.user_id, &data.user_id)
        && owner != user
    {
        return Err(AppError::NotFound(format!("order {id}")));
    }

    Ok(OrderShowTemplate {
        layout: Layout::new(&session, Some(&data)).await,
        timeline: timeline(order.status),
        cancelled: order.status == OrderStatus::Cancelled,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_marks_reached_steps() {
        let steps = timeline(OrderStatus::Shipped);
        assert_eq!(steps.len(), 4);
        assert!(steps[0].reached && steps[1].reached && steps[2].reached);
        assert!(!steps[3].reached);
        assert!(steps[2].current);
        assert!(!steps[1].current);
    }

    #[test]
    fn test_cancelled_order_has_no_timeline() {
        assert!(timeline(OrderStatus::Cancelled).is_empty());
    }
}
