//! Per-session notification feeds fed by the push channel.
//!
//! Each signed-in browser gets a feed keyed by a random id stored in its
//! session. Starting a feed spawns one listener task that reads the
//! notification service's event stream; new notifications are prepended
//! and bump the unread count. The feed grows for the session's lifetime.
//! The listener exits when the channel closes or fails and is not
//! restarted on its own.
//!
//! Feeds are dropped on sign-out. Sessions that simply expire never sign
//! out, so a reaper task drops feeds nobody has read for longer than the
//! session lifetime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use secrecy::SecretString;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tower_sessions::Session;
use tracing::{debug, info, warn};

use crate::api::types::Notification;
use crate::api::{ApiClient, ApiError, PushEvent};
use crate::models::session_keys;

/// Notifications received for one session, newest first.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    pub items: Vec<Notification>,
    pub unread: usize,
}

impl NotificationFeed {
    /// Prepend a notification and count it as unread.
    pub fn push(&mut self, notification: Notification) {
        self.items.insert(0, notification);
        self.unread += 1;
    }

    pub const fn mark_all_read(&mut self) {
        self.unread = 0;
    }
}

/// Feed shared between a listener task and the request handlers.
pub type SharedFeed = Arc<RwLock<NotificationFeed>>;

/// How often the reaper looks for idle feeds.
pub const REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct FeedEntry {
    feed: SharedFeed,
    listener: JoinHandle<()>,
    last_seen: Instant,
}

impl FeedEntry {
    fn listening(&self) -> bool {
        !self.listener.is_finished()
    }
}

/// Owner of every session's notification feed.
#[derive(Clone, Default)]
pub struct NotificationHub {
    feeds: Arc<Mutex<HashMap<String, FeedEntry>>>,
}

impl NotificationHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start listening for `key` with the given access token.
    ///
    /// Returns `false` when the key already has a running listener, which
    /// is left alone.
    pub async fn start(&self, key: &str, api: &ApiClient, token: &SecretString) -> bool {
        let api = api.clone();
        let token = token.clone();
        self.spawn_with(key, move |feed| async move {
            match api.notifications().subscribe(&token).await {
                Ok(events) => consume(events, feed).await,
                Err(e) => warn!(error = %e, "Could not open notification channel"),
            }
        })
        .await
    }

    /// Start a feed whose listener is produced by `listener`.
    ///
    /// Returns `false` without calling `listener` when the key already has a
    /// running listener. A feed whose listener has exited keeps its
    /// notifications and gets the new listener.
    pub async fn spawn_with<F, Fut>(&self, key: &str, listener: F) -> bool
    where
        F: FnOnce(SharedFeed) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut feeds = self.feeds.lock().await;
        let feed = match feeds.get_mut(key) {
            Some(entry) if entry.listening() => {
                entry.last_seen = Instant::now();
                debug!("Notification listener already started");
                return false;
            }
            Some(entry) => Arc::clone(&entry.feed),
            None => SharedFeed::default(),
        };

        let listener = tokio::spawn(listener(Arc::clone(&feed)));
        feeds.insert(
            key.to_string(),
            FeedEntry {
                feed,
                listener,
                last_seen: Instant::now(),
            },
        );
        info!("Notification listener started");
        true
    }

    /// Stop the listener and drop the feed.
    pub async fn stop(&self, key: &str) {
        if let Some(entry) = self.feeds.lock().await.remove(key) {
            entry.listener.abort();
            info!("Notification listener stopped");
        }
    }

    /// Whether `key` has a feed.
    pub async fn contains(&self, key: &str) -> bool {
        self.feeds.lock().await.contains_key(key)
    }

    /// Whether `key` has a listener that is still connected.
    pub async fn is_listening(&self, key: &str) -> bool {
        self.feeds
            .lock()
            .await
            .get(key)
            .is_some_and(FeedEntry::listening)
    }

    /// The feed for `key`, marking it as read by its session.
    async fn feed(&self, key: &str) -> Option<SharedFeed> {
        self.feeds.lock().await.get_mut(key).map(|entry| {
            entry.last_seen = Instant::now();
            Arc::clone(&entry.feed)
        })
    }

    /// Drop every feed not read for at least `max_idle`, stopping its
    /// listener. Returns how many were dropped.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let mut feeds = self.feeds.lock().await;
        let before = feeds.len();
        feeds.retain(|_, entry| {
            let keep = entry.last_seen.elapsed() < max_idle;
            if !keep {
                entry.listener.abort();
            }
            keep
        });
        before - feeds.len()
    }

    /// Spawn a background task that runs [`Self::reap_idle`] every `every`.
    pub fn spawn_reaper(&self, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let hub = self.clone();
        info!(?max_idle, "Spawning notification feed reaper");
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            loop {
                ticks.tick().await;
                let reaped = hub.reap_idle(max_idle).await;
                if reaped > 0 {
                    info!(reaped, "Dropped idle notification feeds");
                }
            }
        })
    }

    /// Unread count, zero for unknown keys.
    pub async fn unread(&self, key: &str) -> usize {
        match self.feed(key).await {
            Some(feed) => feed.read().await.unread,
            None => 0,
        }
    }

    /// Copy of the feed, empty for unknown keys.
    pub async fn snapshot(&self, key: &str) -> NotificationFeed {
        match self.feed(key).await {
            Some(feed) => feed.read().await.clone(),
            None => NotificationFeed::default(),
        }
    }

    /// Reset the unread count.
    pub async fn mark_all_read(&self, key: &str) {
        if let Some(feed) = self.feed(key).await {
            feed.write().await.mark_all_read();
        }
    }
}

/// Apply push events to a feed until the stream ends or fails.
pub async fn consume<S>(events: S, feed: SharedFeed)
where
    S: Stream<Item = Result<PushEvent, ApiError>>,
{
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(PushEvent::NewNotification(notification)) => {
                debug!(notification_id = %notification.id, "Notification received");
                feed.write().await.push(notification);
            }
            Ok(PushEvent::Other(name)) => debug!(event = %name, "Ignoring push event"),
            Err(e) => {
                warn!(error = %e, "Notification channel failed");
                return;
            }
        }
    }
    info!("Notification channel closed");
}

/// The session's feed key, created on first use.
pub async fn feed_key(session: &Session) -> String {
    if let Ok(Some(key)) = session
        .get::<String>(session_keys::NOTIFICATION_FEED)
        .await
    {
        return key;
    }
    let key = uuid::Uuid::new_v4().to_string();
    if let Err(e) = session
        .insert(session_keys::NOTIFICATION_FEED, &key)
        .await
    {
        warn!(error = %e, "Failed to store notification feed key");
    }
    key
}

/// The session's feed key if one was ever created.
pub async fn existing_feed_key(session: &Session) -> Option<String> {
    session
        .get::<String>(session_keys::NOTIFICATION_FEED)
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use souk_core::NotificationId;

    use super::*;
    use crate::api::Service;

    fn notification(id: &str) -> Notification {
        Notification {
            id: NotificationId::new(id),
            title: String::new(),
            message: format!("message {id}"),
            link: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_consume_prepends_and_counts() {
        let feed = SharedFeed::default();
        let events = futures::stream::iter(vec![
            Ok(PushEvent::NewNotification(notification("n1"))),
            Ok(PushEvent::Other("presence".to_string())),
            Ok(PushEvent::NewNotification(notification("n2"))),
        ]);

        consume(events, Arc::clone(&feed)).await;

        let feed = feed.read().await;
        assert_eq!(feed.unread, 2);
        assert_eq!(feed.items[0].id.as_str(), "n2");
        assert_eq!(feed.items[1].id.as_str(), "n1");
    }

    #[tokio::test]
    async fn test_consume_stops_at_first_error() {
        let feed = SharedFeed::default();
        let events = futures::stream::iter(vec![
            Ok(PushEvent::NewNotification(notification("n1"))),
            Err(ApiError::Unauthorized(Service::Notifications)),
            Ok(PushEvent::NewNotification(notification("n2"))),
        ]);

        consume(events, Arc::clone(&feed)).await;

        assert_eq!(feed.read().await.items.len(), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let hub = NotificationHub::new();
        let started = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let started = Arc::clone(&started);
            hub.spawn_with("feed-1", move |feed| async move {
                started.fetch_add(1, Ordering::SeqCst);
                feed.write().await.push(notification("n1"));
            })
            .await;
        }
        tokio::task::yield_now().await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(hub.contains("feed-1").await);
    }

    /// Wait until the listener for `key` has exited.
    async fn until_finished(hub: &NotificationHub, key: &str) {
        for _ in 0..1000 {
            if !hub.is_listening(key).await {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("listener for {key} did not finish");
    }

    #[tokio::test]
    async fn test_finished_listener_can_be_restarted() {
        let hub = NotificationHub::new();
        hub.spawn_with("feed-3", |feed| async move {
            feed.write().await.push(notification("n1"));
        })
        .await;
        until_finished(&hub, "feed-3").await;
        assert!(hub.contains("feed-3").await);

        let restarted = hub
            .spawn_with("feed-3", |feed| async move {
                feed.write().await.push(notification("n2"));
                futures::future::pending::<()>().await;
            })
            .await;
        assert!(restarted);
        tokio::task::yield_now().await;

        assert!(hub.is_listening("feed-3").await);
        let feed = hub.snapshot("feed-3").await;
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].id.as_str(), "n2");
        hub.stop("feed-3").await;
    }

    #[tokio::test]
    async fn test_reap_idle_drops_only_stale_feeds() {
        let hub = NotificationHub::new();
        for key in ["stale", "fresh"] {
            hub.spawn_with(key, |_feed| futures::future::pending::<()>())
                .await;
        }

        assert_eq!(hub.reap_idle(Duration::from_secs(3600)).await, 0);
        assert!(hub.contains("stale").await);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(hub.unread("fresh").await, 0);
        assert_eq!(hub.reap_idle(Duration::from_millis(200)).await, 1);
        assert!(!hub.contains("stale").await);
        assert!(hub.contains("fresh").await);

        assert_eq!(hub.reap_idle(Duration::ZERO).await, 1);
        assert!(!hub.contains("fresh").await);
    }

    #[tokio::test]
    async fn test_mark_read_and_stop() {
        let hub = NotificationHub::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        hub.spawn_with("feed-2", move |feed| async move {
            feed.write().await.push(notification("n1"));
            let _ = tx.send(());
            futures::future::pending::<()>().await;
        })
        .await;
        rx.await.unwrap();

        assert_eq!(hub.unread("feed-2").await, 1);
        hub.mark_all_read("feed-2").await;
        assert_eq!(hub.unread("feed-2").await, 0);
        assert_eq!(hub.snapshot("feed-2").await.items.len(), 1);

        hub.stop("feed-2").await;
        assert!(!hub.contains("feed-2").await);
        assert_eq!(hub.unread("feed-2").await, 0);
        assert!(hub.snapshot("feed-2").await.items.is_empty());
    }
}
