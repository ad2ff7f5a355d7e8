//! Shared plumbing for the tabbed approval tables.
//!
//! Every board page renders the same shape: status tabs, one page of rows
//! with their status buttons, and pagination. Status buttons post over HTMX
//! and get the board fragment back, already reconciled.

use std::future::Future;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use souk_core::{EntityStatus, OrderStatus, PageRequest, Price};

use crate::api::ApiError;
use crate::api::types::{Order, Product, Store};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::wants_bare_status;
use crate::models::toast::push_flash;
use crate::models::{HxTrigger, Toast};
use crate::routes::layout::{Layout, PageNav};
use crate::services::approval::{
    Approvable, ApprovalBoard, TAB_PAGE_SIZE, discard_board, load_board, save_board,
};

/// A board page: session cache name, heading and URL.
#[derive(Debug, Clone, Copy)]
pub struct BoardSpec {
    pub name: &'static str,
    pub heading: &'static str,
    pub path: &'static str,
}

/// How an entity shows up as a board row.
pub trait BoardRow: Approvable {
    fn title(&self) -> String;
    fn detail(&self) -> String;
    /// Statuses the row offers buttons for.
    fn actions(&self) -> Vec<Self::Status>;
}

fn other_statuses<S: EntityStatus>(current: S) -> Vec<S> {
    S::ALL.iter().copied().filter(|s| *s != current).collect()
}

impl BoardRow for Product {
    fn title(&self) -> String {
        self.name.clone()
    }

    fn detail(&self) -> String {
        let price = Price::inr(self.price).display();
        match &self.store_name {
            Some(store) => format!("{price} · {store}"),
            None => price,
        }
    }

    fn actions(&self) -> Vec<Self::Status> {
        other_statuses(self.status)
    }
}

impl BoardRow for Store {
    fn title(&self) -> String {
        self.name.clone()
    }

    fn detail(&self) -> String {
        self.city.clone().unwrap_or_default()
    }

    fn actions(&self) -> Vec<Self::Status> {
        other_statuses(self.status)
    }
}

impl BoardRow for Order {
    fn title(&self) -> String {
        format!("Order {}", self.id)
    }

    fn detail(&self) -> String {
        let count: u32 = self.items.iter().map(|line| line.quantity).sum();
        format!("{count} items · {}", Price::inr(self.total).display())
    }

    fn actions(&self) -> Vec<OrderStatus> {
        self.status.next_allowed().to_vec()
    }
}

// =============================================================================
// View types
// =============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct BoardQuery {
    pub tab: Option<String>,
    pub page: Option<u32>,
    pub refresh: Option<u8>,
}

impl BoardQuery {
    fn wants_refresh(&self) -> bool {
        self.refresh.is_some_and(|r| r != 0)
    }
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub id: String,
    pub status: String,
    pub tab: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TabLink {
    pub label: &'static str,
    pub count: usize,
    pub href: String,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct RowAction {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone)]
pub struct RowView {
    pub id: String,
    pub title: String,
    pub detail: String,
    pub status: &'static str,
    pub actions: Vec<RowAction>,
}

/// Everything the board fragment renders.
#[derive(Debug, Clone)]
pub struct BoardBody {
    pub path: &'static str,
    pub tab: &'static str,
    pub page: u32,
    pub tabs: Vec<TabLink>,
    pub rows: Vec<RowView>,
    pub nav: PageNav,
    pub fetched_at: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "board/index.html")]
pub struct BoardPageTemplate {
    pub layout: Layout,
    pub heading: &'static str,
    pub body: BoardBody,
}

#[derive(Template, WebTemplate)]
#[template(path = "partials/board.html")]
pub struct BoardFragmentTemplate {
    pub body: BoardBody,
}

fn parse_tab<S: EntityStatus>(tab: Option<&str>) -> S {
    tab.and_then(|t| t.parse().ok()).unwrap_or(S::ALL[0])
}

/// Render one tab page of a board.
#[must_use]
pub fn board_body<E: BoardRow>(
    board: &ApprovalBoard<E>,
    path: &'static str,
    tab: Option<&str>,
    page: Option<u32>,
) -> BoardBody {
    let active: E::Status = parse_tab(tab);
    let page = board.tab(active, PageRequest::new(page.unwrap_or(1), TAB_PAGE_SIZE));

    let tabs = board
        .tabs()
        .into_iter()
        .map(|t| TabLink {
            label: t.status.label(),
            count: t.count,
            href: format!("{path}?tab={}", t.status.as_str()),
            active: t.status == active,
        })
        .collect();

    let rows = page
        .items
        .iter()
        .map(|entity| RowView {
            id: entity.id().to_string(),
            title: entity.title(),
            detail: entity.detail(),
            status: entity.status().label(),
            actions: entity
                .actions()
                .into_iter()
                .map(|s| RowAction {
                    value: s.as_str(),
                    label: s.label(),
                })
                .collect(),
        })
        .collect();

    BoardBody {
        path,
        tab: active.as_str(),
        page: page.page,
        nav: PageNav::new(&page, path, &[("tab", active.as_str())]),
        tabs,
        rows,
        fetched_at: board.fetched_at().format("%H:%M").to_string(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// The session's cached board, fetched when missing or on `?refresh=1`.
pub async fn cached_board<E, F, Fut>(
    session: &Session,
    spec: BoardSpec,
    refresh: bool,
    fetch_tab: F,
) -> ApprovalBoard<E>
where
    E: BoardRow,
    F: Fn(E::Status) -> Fut,
    Fut: Future<Output = std::result::Result<Vec<E>, ApiError>>,
{
    if refresh {
        discard_board(session, spec.name).await;
    } else if let Some(board) = load_board(session, spec.name).await {
        return board;
    }

    let board = ApprovalBoard::load(fetch_tab).await;
    save_board(session, spec.name, &board).await;
    board
}

/// Full board page.
pub async fn board_page<E, F, Fut>(
    session: &Session,
    layout: Layout,
    spec: BoardSpec,
    query: &BoardQuery,
    fetch_tab: F,
) -> Response
where
    E: BoardRow,
    F: Fn(E::Status) -> Fut,
    Fut: Future<Output = std::result::Result<Vec<E>, ApiError>>,
{
    let board = cached_board(session, spec, query.wants_refresh(), fetch_tab).await;
    BoardPageTemplate {
        layout,
        heading: spec.heading,
        body: board_body(&board, spec.path, query.tab.as_deref(), query.page),
    }
    .into_response()
}

/// Apply a status change through `update` and reconcile the cached board.
///
/// HTMX posts get the refreshed board fragment and a toast; plain posts are
/// redirected back to the tab they came from.
///
/// # Errors
///
/// Returns an error if the service rejects the session's token.
pub async fn change_status<E, F, Fut>(
    session: &Session,
    headers: &HeaderMap,
    spec: BoardSpec,
    form: StatusForm,
    update: F,
) -> Result<Response>
where
    E: BoardRow,
    E::Id: From<String>,
    F: FnOnce(E::Id, E::Status) -> Fut,
    Fut: Future<Output = std::result::Result<Option<E>, ApiError>>,
{
    let Ok(requested) = form.status.parse::<E::Status>() else {
        return Err(AppError::BadRequest(format!("unknown status {}", form.status)));
    };
    let id = E::Id::from(form.id);

    let Some(mut board) = load_board::<E>(session, spec.name).await else {
        warn!(board = spec.name, "Status change for a board that is not cached");
        push_flash(session, &Toast::warning("The table was out of date and has been reloaded")).await;
        return Ok(Redirect::to(spec.path).into_response());
    };

    let current = board.get(&id).map(Approvable::status);
    let toast = match current {
        None => Toast::error(format!("{id} is no longer on this table")),
        Some(status) if status == requested => Toast::info(format!("Already {}", requested.label())),
        Some(_) => match update(id.clone(), requested).await {
            Ok(confirmed) => match board.reconcile(&id, requested, confirmed) {
                Ok(moved) => {
                    info!(
                        board = spec.name,
                        id = %id,
                        from = %moved.from,
                        to = %moved.to,
                        "Status changed"
                    );
                    save_board(session, spec.name, &board).await;
                    Toast::success(format!(
                        "Moved from {} to {}",
                        moved.from.label(),
                        moved.to.label()
                    ))
                }
                Err(e) => Toast::error(e.to_string()),
            },
            Err(e) if e.is_unauthorized() => return Err(e.into()),
            Err(e) => {
                warn!(board = spec.name, id = %id, error = %e, "Status change failed");
                Toast::error(e.user_message())
            }
        },
    };

    if wants_bare_status(headers) {
        let fragment = BoardFragmentTemplate {
            body: board_body(&board, spec.path, form.tab.as_deref(), form.page),
        };
        return Ok((HxTrigger::new().toast(&toast).into_headers(), fragment).into_response());
    }

    push_flash(session, &toast).await;
    let back = match form.tab {
        Some(tab) => format!("{}?tab={}", spec.path, urlencoding::encode(&tab)),
        None => spec.path.to_string(),
    };
    Ok(Redirect::to(&back).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use souk_core::{OrderId, ProductId, ProductStatus};

    use super::*;

    fn product(id: &str, status: ProductStatus) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Decimal::from(250),
            images: Vec::new(),
            category_id: None,
            subcategory_id: None,
            store_id: None,
            store_name: Some("Loom House".to_string()),
            stock: 3,
            status,
            rating: None,
            created_at: None,
        }
    }

    #[test]
    fn test_board_body_selects_tab() {
        let board = ApprovalBoard::new(vec![
            product("p1", ProductStatus::Pending),
            product("p2", ProductStatus::Approved),
        ]);

        let body = board_body(&board, "/admin/products", Some("approved"), None);

        assert_eq!(body.tab, "approved");
        assert_eq!(body.rows.len(), 1);
        assert_eq!(body.rows[0].id, "p2");
        assert_eq!(body.rows[0].detail, "₹250.00 · Loom House");
        assert!(body.tabs.iter().any(|t| t.active && t.label == "Approved"));
        let actions: Vec<_> = body.rows[0].actions.iter().map(|a| a.value).collect();
        assert_eq!(actions, ["pending", "rejected"]);
    }

    #[test]
    fn test_unknown_tab_falls_back_to_first() {
        let board = ApprovalBoard::new(vec![product("p1", ProductStatus::Pending)]);
        let body = board_body(&board, "/admin/products", Some("archived"), None);
        assert_eq!(body.tab, "pending");
        assert_eq!(body.rows.len(), 1);
    }

    #[test]
    fn test_order_rows_offer_allowed_transitions() {
        let order = Order {
            id: OrderId::new("o1"),
            user_id: None,
            store_id: None,
            items: Vec::new(),
            total: Decimal::from(10),
            status: OrderStatus::Shipped,
            shipping_address: None,
            tracking_number: None,
            created_at: None,
        };
        assert_eq!(order.actions(), vec![OrderStatus::Delivered]);
        assert!(BoardRow::title(&order).contains("o1"));
    }
}
