//! Admin console: dashboard, approval boards and the user directory.

pub mod approvals;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use souk_core::{Page, PageRequest, ProductStatus, Role};

use crate::api::types::{Notification, Product, Store, UserCounts, UserSummary};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::layout::{Layout, PageNav};
use crate::services::notifications::feed_key;
use crate::state::AppState;

const DASHBOARD_STORES: u32 = 5;
const DASHBOARD_PENDING: usize = 5;
const DASHBOARD_NOTIFICATIONS: usize = 5;
const USERS_PAGE_SIZE: u32 = 20;

#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct AdminDashboardTemplate {
    pub layout: Layout,
    pub stores: Vec<Store>,
    pub store_total: u64,
    pub pending_products: Vec<Product>,
    pub pending_total: usize,
    pub notifications: Vec<Notification>,
    pub counts: UserCounts,
}

/// Overview. The four panels are fetched concurrently; a failed panel
/// renders empty.
///
/// # Errors
///
/// Returns an error if the token is rejected.
#[instrument(skip(state, session, data))]
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
) -> Result<impl IntoResponse> {
    let api = state.api();
    let token = &data.access_token;
    let stores_request = PageRequest::new(1, DASHBOARD_STORES);
    let key = feed_key(&session).await;
    let (store_api, product_api, auth_api) = (api.stores(), api.products(), api.auth());

    let (stores, pending, counts, feed) = tokio::join!(
        store_api.list(stores_request),
        product_api.list_by_status(token, ProductStatus::Pending),
        auth_api.user_counts(token),
        state.notifications().snapshot(&key),
    );

    let stores = stores.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load stores");
        Page::empty(stores_request)
    });
    let pending = match pending {
        Ok(pending) => pending,
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to load pending products");
            Vec::new()
        }
    };
    let counts = match counts {
        Ok(counts) => counts,
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to load user counts");
            UserCounts::default()
        }
    };

    Ok(AdminDashboardTemplate {
        layout: Layout::new(&session, Some(&data)).await,
        store_total: stores.total,
        stores: stores.items,
        pending_total: pending.len(),
        pending_products: pending.into_iter().take(DASHBOARD_PENDING).collect(),
        notifications: feed
            .items
            .into_iter()
            .take(DASHBOARD_NOTIFICATIONS)
            .collect(),
        counts,
    })
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub role: Option<String>,
    pub page: Option<u32>,
}

impl UsersQuery {
    /// The role filter; anything unrecognised means every role.
    fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }
}

/// Role filter tab.
#[derive(Debug, Clone)]
pub struct RoleTab {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

fn role_tabs(selected: Option<Role>) -> Vec<RoleTab> {
    let all = RoleTab {
        label: "All",
        href: "/admin/users".to_string(),
        active: selected.is_none(),
    };
    std::iter::once(all)
        .chain(Role::ALL.iter().map(|role| RoleTab {
            label: role.label(),
            href: format!("/admin/users?role={}", role.as_str()),
            active: selected == Some(*role),
        }))
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub layout: Layout,
    pub tabs: Vec<RoleTab>,
    pub users: Vec<UserSummary>,
    pub total: u64,
    pub nav: PageNav,
}

/// Account directory with a role filter.
///
/// # Errors
///
/// Returns an error if the token is rejected.
#[instrument(skip(state, session, data))]
pub async fn users(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
    Query(query): Query<UsersQuery>,
) -> Result<impl IntoResponse> {
    let role = query.role();
    let request = PageRequest::new(query.page.unwrap_or(1), USERS_PAGE_SIZE);

    let page = match state
        .api()
        .auth()
        .users(&data.access_token, role, request)
        .await
    {
        Ok(page) => page,
        Err(e) if e.is_unauthorized() => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to load users");
            Page::empty(request)
        }
    };
    let nav = PageNav::new(
        &page,
        "/admin/users",
        &[("role", role.map_or("", Role::as_str))],
    );

    Ok(UsersTemplate {
        layout: Layout::new(&session, Some(&data)).await,
        tabs: role_tabs(role),
        total: page.total,
        users: page.items,
        nav,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tabs_mark_selection() {
        let tabs = role_tabs(Some(Role::Vendor));
        assert_eq!(tabs.len(), Role::ALL.len() + 1);
        assert!(!tabs[0].active);
        let active: Vec<_> = tabs.iter().filter(|t| t.active).map(|t| t.label).collect();
        assert_eq!(active, [Role::Vendor.label()]);
    }

    #[test]
    fn test_unknown_role_filter_shows_everyone() {
        let query = UsersQuery {
            role: Some("superuser".to_string()),
            page: None,
        };
        assert_eq!(query.role(), None);
        assert!(role_tabs(query.role())[0].active);
    }
}
