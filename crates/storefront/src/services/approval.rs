//! Approval boards for the admin and vendor tables.
//!
//! A board caches every entity of one kind, grouped into one tab per status
//! in the status enum's `ALL` order. After the service confirms a status
//! change the board is reconciled locally, so the entity leaves its old tab
//! and shows up in the new one without re-fetching the table. Boards live in
//! the browser session under `approval:<board>`.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, warn};

use souk_core::{
    EntityStatus, OrderId, OrderStatus, Page, PageRequest, ProductId, ProductStatus, StoreId,
    StoreStatus,
};

use crate::api::ApiError;
use crate::api::types::{Order, Product, Store};
use crate::models::session_keys;

/// Page size of every board tab.
pub const TAB_PAGE_SIZE: u32 = 10;

/// An entity shown on an approval board.
pub trait Approvable: Clone + Serialize + DeserializeOwned + Send + Sync {
    type Id: Clone + Eq + Hash + Display + Send + Sync;
    type Status: EntityStatus + Serialize + DeserializeOwned + Send + Sync;

    fn id(&self) -> &Self::Id;
    fn status(&self) -> Self::Status;
    fn set_status(&mut self, status: Self::Status);
}

impl Approvable for Product {
    type Id = ProductId;
    type Status = ProductStatus;

    fn id(&self) -> &ProductId {
        &self.id
    }

    fn status(&self) -> ProductStatus {
        self.status
    }

    fn set_status(&mut self, status: ProductStatus) {
        self.status = status;
    }
}

impl Approvable for Store {
    type Id = StoreId;
    type Status = StoreStatus;

    fn id(&self) -> &StoreId {
        &self.id
    }

    fn status(&self) -> StoreStatus {
        self.status
    }

    fn set_status(&mut self, status: StoreStatus) {
        self.status = status;
    }
}

impl Approvable for Order {
    type Id = OrderId;
    type Status = OrderStatus;

    fn id(&self) -> &OrderId {
        &self.id
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
    }
}

/// Board errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("{0} is not on this board")]
    UnknownEntity(String),
}

/// One tab header: status plus the number of entities in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabCount<S> {
    pub status: S,
    pub count: usize,
}

/// The outcome of reconciling a confirmed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moved<S> {
    pub from: S,
    pub to: S,
}

/// Cached entities grouped by status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "E: Approvable")]
pub struct ApprovalBoard<E> {
    entities: Vec<E>,
    fetched_at: DateTime<Utc>,
}

impl<E: Approvable> ApprovalBoard<E> {
    /// A board holding `entities`. Later duplicates of an id are dropped.
    #[must_use]
    pub fn new(entities: Vec<E>) -> Self {
        let mut seen = HashSet::new();
        let entities = entities
            .into_iter()
            .filter(|e| seen.insert(e.id().clone()))
            .collect();
        Self {
            entities,
            fetched_at: Utc::now(),
        }
    }

    /// Fetch every tab concurrently with `fetch_tab`.
    ///
    /// A failed tab is logged and left empty.
    pub async fn load<F, Fut>(fetch_tab: F) -> Self
    where
        F: Fn(E::Status) -> Fut,
        Fut: Future<Output = Result<Vec<E>, ApiError>>,
    {
        let statuses = <E::Status as EntityStatus>::ALL;
        let results = join_all(statuses.iter().map(|status| fetch_tab(*status))).await;

        let mut entities = Vec::new();
        for (status, result) in statuses.iter().zip(results) {
            match result {
                Ok(mut tab) => {
                    debug!(status = %status, count = tab.len(), "Loaded board tab");
                    entities.append(&mut tab);
                }
                Err(e) => warn!(status = %status, error = %e, "Failed to load board tab"),
            }
        }
        Self::new(entities)
    }

    /// When the board was fetched.
    #[must_use]
    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Number of entities per tab, in tab order.
    #[must_use]
    pub fn tabs(&self) -> Vec<TabCount<E::Status>> {
        <E::Status as EntityStatus>::ALL
            .iter()
            .map(|status| TabCount {
                status: *status,
                count: self.entities.iter().filter(|e| e.status() == *status).count(),
            })
            .collect()
    }

    /// One page of a tab.
    #[must_use]
    pub fn tab(&self, status: E::Status, page: PageRequest) -> Page<E> {
        let in_tab: Vec<E> = self
            .entities
            .iter()
            .filter(|e| e.status() == status)
            .cloned()
            .collect();
        Page::from_slice(&in_tab, page)
    }

    /// Look up an entity.
    #[must_use]
    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Apply a status change the service has confirmed.
    ///
    /// `confirmed` is the entity returned by the service, if it returned one;
    /// otherwise the cached copy takes `requested`. The entity moves to the
    /// front of its new tab.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::UnknownEntity` if `id` is not on the board.
    pub fn reconcile(
        &mut self,
        id: &E::Id,
        requested: E::Status,
        confirmed: Option<E>,
    ) -> Result<Moved<E::Status>, BoardError> {
        let index = self
            .entities
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| BoardError::UnknownEntity(id.to_string()))?;

        let mut entity = self.entities.remove(index);
        let from = entity.status();
        match confirmed {
            Some(updated) if updated.id() == id => entity = updated,
            _ => entity.set_status(requested),
        }
        let to = entity.status();
        self.entities.insert(0, entity);

        Ok(Moved { from, to })
    }
}

// =============================================================================
// Session storage
// =============================================================================

fn session_key(board: &str) -> String {
    format!("{}{board}", session_keys::APPROVAL_PREFIX)
}

/// Read a cached board.
pub async fn load_board<E: Approvable>(session: &Session, board: &str) -> Option<ApprovalBoard<E>> {
    match session.get::<ApprovalBoard<E>>(&session_key(board)).await {
        Ok(found) => found,
        Err(e) => {
            warn!(board, error = %e, "Discarding unreadable approval board");
            None
        }
    }
}

/// Cache a board.
pub async fn save_board<E: Approvable>(session: &Session, board: &str, value: &ApprovalBoard<E>) {
    if let Err(e) = session.insert(&session_key(board), value).await {
        warn!(board, error = %e, "Failed to cache approval board");
    }
}

/// Drop a cached board so the next view re-fetches it.
pub async fn discard_board(session: &Session, board: &str) {
    if let Err(e) = session.remove_value(&session_key(board)).await {
        warn!(board, error = %e, "Failed to discard approval board");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::api::Service;

    fn product(id: &str, status: ProductStatus) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Decimal::from(100),
            images: Vec::new(),
            category_id: None,
            subcategory_id: None,
            store_id: None,
            store_name: None,
            stock: 1,
            status,
            rating: None,
            created_at: None,
        }
    }

    fn board() -> ApprovalBoard<Product> {
        ApprovalBoard::new(vec![
            product("p1", ProductStatus::Pending),
            product("p2", ProductStatus::Pending),
            product("p3", ProductStatus::Approved),
        ])
    }

    fn count(board: &ApprovalBoard<Product>, status: ProductStatus) -> usize {
        board
            .tabs()
            .into_iter()
            .find(|t| t.status == status)
            .unwrap()
            .count
    }

    #[test]
    fn test_tabs_follow_status_order() {
        let tabs = board().tabs();
        let statuses: Vec<_> = tabs.iter().map(|t| t.status).collect();
        assert_eq!(statuses, ProductStatus::ALL);
        assert_eq!(tabs[0].count, 2);
        assert_eq!(tabs[1].count, 1);
        assert_eq!(tabs[2].count, 0);
    }

    #[test]
    fn test_reconcile_moves_between_tabs() {
        let mut board = board();

        let moved = board
            .reconcile(&ProductId::new("p1"), ProductStatus::Approved, None)
            .unwrap();

        assert_eq!(moved.from, ProductStatus::Pending);
        assert_eq!(moved.to, ProductStatus::Approved);
        assert_eq!(count(&board, ProductStatus::Pending), 1);
        assert_eq!(count(&board, ProductStatus::Approved), 2);

        let approved = board.tab(ProductStatus::Approved, PageRequest::new(1, 10));
        assert_eq!(approved.items[0].id.as_str(), "p1");
        let pending = board.tab(ProductStatus::Pending, PageRequest::new(1, 10));
        assert!(pending.items.iter().all(|p| p.id.as_str() != "p1"));
    }

    #[test]
    fn test_reconcile_prefers_confirmed_entity() {
        let mut board = board();
        let mut confirmed = product("p2", ProductStatus::Rejected);
        confirmed.name = "Renamed".to_string();

        board
            .reconcile(&ProductId::new("p2"), ProductStatus::Rejected, Some(confirmed))
            .unwrap();

        let got = board.get(&ProductId::new("p2")).unwrap();
        assert_eq!(got.name, "Renamed");
        assert_eq!(got.status, ProductStatus::Rejected);
    }

    #[test]
    fn test_reconcile_unknown_entity() {
        let mut board = board();
        let err = board
            .reconcile(&ProductId::new("missing"), ProductStatus::Approved, None)
            .unwrap_err();
        assert_eq!(err, BoardError::UnknownEntity("missing".to_string()));
        assert_eq!(count(&board, ProductStatus::Pending), 2);
    }

    #[test]
    fn test_duplicate_ids_are_dropped() {
        let board = ApprovalBoard::new(vec![
            product("p1", ProductStatus::Pending),
            product("p1", ProductStatus::Approved),
        ]);
        assert_eq!(count(&board, ProductStatus::Pending), 1);
        assert_eq!(count(&board, ProductStatus::Approved), 0);
    }

    #[test]
    fn test_tab_pagination() {
        let entities = (1..=25)
            .map(|i| product(&format!("p{i}"), ProductStatus::Pending))
            .collect();
        let board = ApprovalBoard::new(entities);
        let page = board.tab(ProductStatus::Pending, PageRequest::new(3, TAB_PAGE_SIZE));
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_load_tolerates_failed_tab() {
        let board = ApprovalBoard::<Product>::load(|status| async move {
            match status {
                ProductStatus::Pending => Ok(vec![product("p1", ProductStatus::Pending)]),
                ProductStatus::Approved => Err(ApiError::Status {
                    service: Service::Products,
                    status: 503,
                    message: String::new(),
                }),
                ProductStatus::Rejected => Ok(vec![product("p9", ProductStatus::Rejected)]),
            }
        })
        .await;

        assert_eq!(count(&board, ProductStatus::Pending), 1);
        assert_eq!(count(&board, ProductStatus::Approved), 0);
        assert_eq!(count(&board, ProductStatus::Rejected), 1);
    }
}
