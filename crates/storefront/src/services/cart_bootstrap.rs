//! Cart bootstrap: find or create the signed-in customer's cart.
//!
//! The cart id is cached per browser session. Resolution order:
//!
//! 1. cached id, no network call
//! 2. the cart service's cart for the user, cached when found
//! 3. a newly created cart, cached
//!
//! Failures are logged and yield `None`; nothing is retried.

use secrecy::{ExposeSecret, SecretString};
use tower_sessions::Session;
use tracing::{debug, instrument, warn};

use souk_core::{CartId, UserId};

use crate::api::{ApiClient, ApiError};
use crate::models::session_keys;
use crate::services::token::decode_token;

/// Where the cart id is remembered between requests.
#[allow(async_fn_in_trait)]
pub trait CartIdCache {
    async fn get(&self) -> Option<CartId>;
    async fn set(&self, cart_id: &CartId);
}

/// The cart service operations bootstrap needs.
#[allow(async_fn_in_trait)]
pub trait CartBackend {
    async fn find_for_user(
        &self,
        token: &SecretString,
        user_id: &UserId,
    ) -> Result<Option<CartId>, ApiError>;

    async fn create(&self, token: &SecretString, user_id: &UserId) -> Result<CartId, ApiError>;
}

/// Resolve the cart id for the token's user.
///
/// Returns `None` when the token cannot be decoded or a service call fails.
#[instrument(skip_all)]
pub async fn bootstrap_cart<C, B>(cache: &C, backend: &B, token: &SecretString) -> Option<CartId>
where
    C: CartIdCache,
    B: CartBackend,
{
    if let Some(cart_id) = cache.get().await {
        debug!(cart_id = %cart_id, "Using cached cart id");
        return Some(cart_id);
    }

    let Some(claims) = decode_token(token.expose_secret()) else {
        warn!("Cannot bootstrap cart without a decodable token");
        return None;
    };
    let user_id = claims.subject;

    match backend.find_for_user(token, &user_id).await {
        Ok(Some(cart_id)) => {
            debug!(cart_id = %cart_id, "Found existing cart");
            cache.set(&cart_id).await;
            return Some(cart_id);
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, user_id = %user_id, "Failed to look up cart");
            return None;
        }
    }

    match backend.create(token, &user_id).await {
        Ok(cart_id) => {
            debug!(cart_id = %cart_id, "Created cart");
            cache.set(&cart_id).await;
            Some(cart_id)
        }
        Err(e) => {
            warn!(error = %e, user_id = %user_id, "Failed to create cart");
            None
        }
    }
}

// =============================================================================
// Production adapters
// =============================================================================

/// Cart id cache backed by the browser session.
pub struct SessionCartCache<'a>(pub &'a Session);

impl CartIdCache for SessionCartCache<'_> {
    async fn get(&self) -> Option<CartId> {
        self.0
            .get::<CartId>(session_keys::CART_ID)
            .await
            .ok()
            .flatten()
    }

    async fn set(&self, cart_id: &CartId) {
        if let Err(e) = self.0.insert(session_keys::CART_ID, cart_id).await {
            warn!(error = %e, "Failed to store cart id in session");
        }
    }
}

impl CartBackend for ApiClient {
    async fn find_for_user(
        &self,
        token: &SecretString,
        user_id: &UserId,
    ) -> Result<Option<CartId>, ApiError> {
        self.carts().find_for_user(token, user_id).await
    }

    async fn create(&self, token: &SecretString, user_id: &UserId) -> Result<CartId, ApiError> {
        self.carts().create(token, user_id).await
    }
}

/// Bootstrap against the live cart service with the session as cache.
pub async fn session_cart(session: &Session, api: &ApiClient, token: &SecretString) -> Option<CartId> {
    bootstrap_cart(&SessionCartCache(session), api, token).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;
    use crate::api::Service;

    #[derive(Default)]
    struct MemoryCache(Mutex<Option<CartId>>);

    impl CartIdCache for MemoryCache {
        async fn get(&self) -> Option<CartId> {
            self.0.lock().unwrap().clone()
        }

        async fn set(&self, cart_id: &CartId) {
            *self.0.lock().unwrap() = Some(cart_id.clone());
        }
    }

    #[derive(Default)]
    struct FakeCarts {
        existing: Option<CartId>,
        fail_lookup: bool,
        fail_create: bool,
        lookups: AtomicUsize,
        creates: AtomicUsize,
    }

    impl CartBackend for FakeCarts {
        async fn find_for_user(
            &self,
            _token: &SecretString,
            user_id: &UserId,
        ) -> Result<Option<CartId>, ApiError> {
            assert_eq!(user_id.as_str(), "u1");
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail_lookup {
                return Err(ApiError::Status {
                    service: Service::Carts,
                    status: 500,
                    message: String::new(),
                });
            }
            Ok(self.existing.clone())
        }

        async fn create(&self, _token: &SecretString, _user_id: &UserId) -> Result<CartId, ApiError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(ApiError::Unauthorized(Service::Carts));
            }
            Ok(CartId::new("new-cart"))
        }
    }

    fn token() -> SecretString {
        SecretString::from(format!("h.{}.s", URL_SAFE_NO_PAD.encode(r#"{"sub":"u1"}"#)))
    }

    #[tokio::test]
    async fn test_cached_id_skips_network() {
        let cache = MemoryCache::default();
        cache.set(&CartId::new("cached")).await;
        let backend = FakeCarts::default();

        let id = bootstrap_cart(&cache, &backend, &token()).await;

        assert_eq!(id.unwrap().as_str(), "cached");
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_existing_cart_is_cached() {
        let cache = MemoryCache::default();
        let backend = FakeCarts {
            existing: Some(CartId::new("server-cart")),
            ..FakeCarts::default()
        };

        let id = bootstrap_cart(&cache, &backend, &token()).await;

        assert_eq!(id.unwrap().as_str(), "server-cart");
        assert_eq!(cache.get().await.unwrap().as_str(), "server-cart");
        assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_creates_once_per_session() {
        let cache = MemoryCache::default();
        let backend = FakeCarts::default();

        let first = bootstrap_cart(&cache, &backend, &token()).await;
        let second = bootstrap_cart(&cache, &backend, &token()).await;

        assert_eq!(first, second);
        assert_eq!(first.unwrap().as_str(), "new-cart");
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_token_makes_no_calls() {
        let cache = MemoryCache::default();
        let backend = FakeCarts::default();

        let id = bootstrap_cart(&cache, &backend, &SecretString::from("not-a-jwt")).await;

        assert!(id.is_none());
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_yield_none_without_retry() {
        let cache = MemoryCache::default();
        let backend = FakeCarts {
            fail_lookup: true,
            ..FakeCarts::default()
        };
        assert!(bootstrap_cart(&cache, &backend, &token()).await.is_none());
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(backend.creates.load(Ordering::SeqCst), 0);

        let backend = FakeCarts {
            fail_create: true,
            ..FakeCarts::default()
        };
        assert!(bootstrap_cart(&cache, &backend, &token()).await.is_none());
        assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
        assert!(cache.get().await.is_none());
    }
}
