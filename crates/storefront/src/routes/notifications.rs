//! Notification feed views.
//!
//! The feed is filled by the session's listener task. Opening the list marks
//! everything read; the header badge polls `/notifications/count`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::types::Notification;
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::layout::Layout;
use crate::services::notifications::feed_key;
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "notifications/index.html")]
pub struct NotificationsTemplate {
    pub layout: Layout,
    pub items: Vec<Notification>,
    pub unread: usize,
    pub listening: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "partials/notification_count.html")]
pub struct NotificationCountTemplate {
    pub count: usize,
}

/// List received notifications and mark them read.
///
/// A session without a running listener (a server restart, or a listener
/// that exited) gets a new one.
#[instrument(skip(state, session, data))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireSession(data): RequireSession,
) -> impl IntoResponse {
    let hub = state.notifications();
    let key = feed_key(&session).await;
    if !hub.is_listening(&key).await {
        hub.start(&key, state.api(), &data.access_token).await;
    }

    let feed = hub.snapshot(&key).await;
    hub.mark_all_read(&key).await;

    NotificationsTemplate {
        layout: Layout::new(&session, Some(&data)).await,
        items: feed.items,
        unread: feed.unread,
        listening: hub.is_listening(&key).await,
    }
}

/// Unread badge fragment.
#[instrument(skip(state, session, _data))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    RequireSession(_data): RequireSession,
) -> impl IntoResponse {
    let key = feed_key(&session).await;
    NotificationCountTemplate {
        count: state.notifications().unread(&key).await,
    }
}
