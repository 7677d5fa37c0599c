//! Server-owned cart mirrored through a write-through snapshot cache.
//!
//! The remote cart service is authoritative for contents and totals. This
//! engine keeps two pieces of local state:
//!
//! - the current cart session identity, persisted under
//!   [`keys::CART_SESSION_ID`](crate::storage::keys::CART_SESSION_ID) and
//!   rotated whenever the server files the cart under a new token;
//! - a snapshot cache keyed by identity. Mutation responses are written
//!   straight into the cache under the identity they returned, so the next
//!   read never needs a network round trip.
//!
//! Identity and cache are only ever changed together under one write lock.
//! A reader holding the read lock sees either the old identity with its
//! snapshot or the new identity with its snapshot, never a mix. Every such
//! write also bumps a generation counter; a refresh that started before the
//! latest write discards its result.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cartkeeper_core::{
    CartEngine, CartLineItem, CartSessionId, CartSnapshot, NewCartItem, normalize_options,
};
use moka::future::Cache;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

use super::CartError;
use super::flags::UiFlags;
use crate::cart_api::{
    AddLineInput, CartService, MutationEnvelope, OptionInput, RemoteCart, RemoveLineInput,
    ServiceError, UpdateLineInput,
};
use crate::storage::{DurableStore, SessionIdentityStore};

/// Shown when the server rejects a mutation without saying why.
pub const FALLBACK_ERROR: &str = "Unable to update cart";

/// Identities one visitor cycles through between evictions.
const CACHE_CAPACITY: u64 = 16;

/// Result of looking up the current identity's cached snapshot.
enum Cached {
    NoSession,
    Miss,
    Hit(CartSnapshot),
}

/// A cart whose contents live on the remote cart service.
pub struct SyncedCart<S> {
    service: S,
    identity: SessionIdentityStore,
    session: RwLock<Option<CartSessionId>>,
    /// Bumped under the `session` write lock on every identity or cache write.
    generation: AtomicU64,
    cache: Cache<CartSessionId, CartSnapshot>,
    flags: UiFlags,
}

impl<S: CartService> SyncedCart<S> {
    /// Build an engine, restoring any persisted cart identity from `store`.
    #[must_use]
    pub fn new(service: S, store: Arc<dyn DurableStore>, cache_ttl: Duration) -> Self {
        let identity = SessionIdentityStore::new(store);
        let session = identity.load();
        debug!(session = ?session, "Synced cart restored");

        Self {
            service,
            identity,
            session: RwLock::new(session),
            generation: AtomicU64::new(0),
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(cache_ttl)
                .build(),
            flags: UiFlags::default(),
        }
    }

    /// The identity the next request will carry.
    pub async fn session(&self) -> Option<CartSessionId> {
        self.session.read().await.clone()
    }

    async fn cached(&self) -> Cached {
        let session = self.session.read().await;
        match session.as_ref() {
            None => Cached::NoSession,
            Some(id) => self.cache.get(id).await.map_or(Cached::Miss, Cached::Hit),
        }
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Re-fetch the cart for the identity current at call start.
    ///
    /// The fetched cart is applied only if no mutation, clear or other
    /// refresh wrote identity or cache while the fetch was in flight.
    /// Otherwise the cache already holds something fresher and the result
    /// is returned without being stored.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Service`] if the fetch fails. The cache is left
    /// untouched in that case.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CartSnapshot, CartError> {
        let (started_with, generation) = {
            let session = self.session.read().await;
            let Some(id) = session.clone() else {
                return Ok(CartSnapshot::empty());
            };
            (id, self.generation.load(Ordering::SeqCst))
        };

        let fetched = self.service.fetch(&started_with).await?;

        let mut session = self.session.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(session = %started_with, "Refresh overtaken by a newer write, discarded");
            return Ok(fetched.map_or_else(CartSnapshot::empty, |cart| cart.snapshot));
        }

        // No write since the fetch started, so `session` is still `started_with`.
        let snapshot = match fetched {
            Some(cart) => {
                self.cache
                    .insert(started_with, cart.snapshot.clone())
                    .await;
                cart.snapshot
            }
            None => {
                debug!(session = %started_with, "Server no longer knows this cart");
                *session = None;
                if let Err(e) = self.identity.clear() {
                    warn!(error = %e, "Failed to clear cart identity");
                }
                self.cache.invalidate(&started_with).await;
                CartSnapshot::empty()
            }
        };
        self.bump_generation();
        Ok(snapshot)
    }

    /// Adopt `cart` as the current state: persist its identity if it
    /// changed, then file its snapshot under that identity.
    async fn apply(&self, cart: RemoteCart) {
        let mut session = self.session.write().await;
        if session.as_ref() != Some(&cart.id) {
            debug!(from = ?*session, to = %cart.id, "Cart identity rotated");
            if let Err(e) = self.identity.save(&cart.id) {
                warn!(error = %e, "Failed to persist cart identity");
            }
            *session = Some(cart.id.clone());
        }
        self.cache.insert(cart.id, cart.snapshot).await;
        self.bump_generation();
    }

    /// Run one mutation under the current identity and apply its result.
    ///
    /// The loading flag is raised for the duration and lowered only after
    /// the new snapshot is readable. A failure leaves identity and cache as
    /// they were.
    async fn mutate<F, Fut>(&self, operation: &'static str, call: F) -> Result<(), CartError>
    where
        F: FnOnce(Option<CartSessionId>) -> Fut + Send,
        Fut: Future<Output = Result<MutationEnvelope, ServiceError>> + Send,
    {
        self.flags.begin();
        let session = self.session().await;

        let outcome = match call(session).await {
            Ok(envelope) => accept(envelope),
            Err(e) => Err(CartError::Service(e)),
        };

        match outcome {
            Ok(cart) => {
                self.apply(cart).await;
                self.flags.settle();
                Ok(())
            }
            Err(e) => {
                self.flags.settle();
                error!(operation, error = %e, "Cart mutation failed");
                Err(e)
            }
        }
    }
}

/// Turn an envelope into the cart it carries.
fn accept(envelope: MutationEnvelope) -> Result<RemoteCart, CartError> {
    if !envelope.success {
        let message = envelope
            .errors
            .into_iter()
            .find(|e| !e.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_ERROR.to_string());
        return Err(CartError::Rejected(message));
    }
    envelope.cart.ok_or(CartError::MalformedResponse)
}

impl<S: CartService> CartEngine for SyncedCart<S> {
    type Error = CartError;

    async fn snapshot(&self) -> CartSnapshot {
        match self.cached().await {
            Cached::NoSession => return CartSnapshot::empty(),
            Cached::Hit(snapshot) => return snapshot,
            Cached::Miss => {}
        }

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Cart refresh failed");
        }

        // Re-read rather than return the refresh result: the identity may
        // have rotated while the fetch was in flight.
        match self.cached().await {
            Cached::Hit(snapshot) => snapshot,
            Cached::NoSession | Cached::Miss => CartSnapshot::empty(),
        }
    }

    #[instrument(skip(self, item), fields(sku = %item.sku))]
    async fn add_item(&self, item: NewCartItem) -> Result<(), CartError> {
        self.flags.open();
        let input = AddLineInput {
            product_id: item.product_id,
            sku: item.sku,
            quantity: 1,
            selected_options: normalize_options(&item.selected_options)
                .iter()
                .map(OptionInput::from)
                .collect(),
        };
        self.mutate("add", |session| async move {
            self.service.add_item(session.as_ref(), input).await
        })
        .await
    }

    #[instrument(skip(self))]
    async fn update_quantity(&self, line: &str, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove_item(line).await;
        }
        let input = UpdateLineInput {
            cart_item_id: line.to_string(),
            quantity: u32::try_from(quantity).unwrap_or(u32::MAX),
        };
        self.mutate("update", |session| async move {
            self.service.update_item(session.as_ref(), input).await
        })
        .await
    }

    #[instrument(skip(self))]
    async fn remove_item(&self, line: &str) -> Result<(), CartError> {
        let input = RemoveLineInput {
            cart_item_id: line.to_string(),
        };
        self.mutate("remove", |session| async move {
            self.service.remove_item(session.as_ref(), input).await
        })
        .await
    }

    /// Empties the server cart and forgets its identity. The next add starts
    /// a fresh cart session.
    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), CartError> {
        self.flags.begin();
        let session = self.session().await;

        let outcome = match self.service.clear(session.as_ref()).await {
            Ok(envelope) if envelope.success => Ok(()),
            Ok(envelope) => accept(envelope).map(|_| ()),
            Err(e) => Err(CartError::Service(e)),
        };
        if let Err(e) = outcome {
            self.flags.settle();
            error!(operation = "clear", error = %e, "Cart mutation failed");
            return Err(e);
        }

        {
            let mut session = self.session.write().await;
            if let Some(old) = session.take() {
                self.cache.invalidate(&old).await;
            }
            if let Err(e) = self.identity.clear() {
                warn!(error = %e, "Failed to clear cart identity");
            }
            self.bump_generation();
        }
        self.flags.settle();
        self.flags.close();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.flags.is_open()
    }

    fn toggle(&self) {
        self.flags.toggle();
    }

    fn close(&self) {
        self.flags.close();
    }

    fn is_loading(&self) -> bool {
        self.flags.is_loading()
    }

    /// Server lines are addressed by their server-assigned id.
    fn line_ref<'a>(&self, item: &'a CartLineItem) -> &'a str {
        item.id.as_str()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use cartkeeper_core::{CurrencyCode, Price, SelectedOption};
    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::{MemoryStore, keys};

    /// Replays canned responses in order and records the session each call
    /// carried.
    #[derive(Default)]
    struct Replay {
        responses: Mutex<VecDeque<Result<MutationEnvelope, ServiceError>>>,
        fetches: Mutex<VecDeque<Option<RemoteCart>>>,
        sessions: Mutex<Vec<Option<String>>>,
    }

    impl Replay {
        fn respond(self, response: Result<MutationEnvelope, ServiceError>) -> Self {
            self.responses.lock().unwrap().push_back(response);
            self
        }

        fn fetch_returns(self, cart: Option<RemoteCart>) -> Self {
            self.fetches.lock().unwrap().push_back(cart);
            self
        }

        fn next(&self, session: Option<&CartSessionId>) -> Result<MutationEnvelope, ServiceError> {
            self.sessions
                .lock()
                .unwrap()
                .push(session.map(|s| s.as_str().to_string()));
            self.responses.lock().unwrap().pop_front().unwrap()
        }
    }

    impl CartService for Replay {
        async fn add_item(
            &self,
            session: Option<&CartSessionId>,
            _input: AddLineInput,
        ) -> Result<MutationEnvelope, ServiceError> {
            self.next(session)
        }

        async fn update_item(
            &self,
            session: Option<&CartSessionId>,
            _input: UpdateLineInput,
        ) -> Result<MutationEnvelope, ServiceError> {
            self.next(session)
        }

        async fn remove_item(
            &self,
            session: Option<&CartSessionId>,
            _input: RemoveLineInput,
        ) -> Result<MutationEnvelope, ServiceError> {
            self.next(session)
        }

        async fn clear(
            &self,
            session: Option<&CartSessionId>,
        ) -> Result<MutationEnvelope, ServiceError> {
            self.next(session)
        }

        async fn fetch(&self, _session: &CartSessionId) -> Result<Option<RemoteCart>, ServiceError> {
            Ok(self.fetches.lock().unwrap().pop_front().flatten())
        }
    }

    fn cart(id: &str, line_id: &str, quantity: u32) -> RemoteCart {
        let line = NewCartItem::new("P1", "P1-RED", "Tee", Decimal::new(1000, 2))
            .with_option(SelectedOption::new("color", "red"));
        let mut line = line.into_line(quantity);
        line.id = line_id.to_string();
        let total = Decimal::from(quantity) * Decimal::new(1000, 2);
        RemoteCart {
            id: CartSessionId::new(id),
            snapshot: CartSnapshot::authoritative(
                vec![line],
                Price::new(total, CurrencyCode::USD),
                "server total".to_string(),
                false,
            ),
        }
    }

    fn engine(service: Replay, store: &Arc<dyn DurableStore>) -> SyncedCart<Replay> {
        SyncedCart::new(service, Arc::clone(store), Duration::from_secs(300))
    }

    fn tee() -> NewCartItem {
        NewCartItem::new("P1", "P1-RED", "Tee", Decimal::new(1000, 2))
            .with_option(SelectedOption::new("color", "red"))
    }

    #[tokio::test]
    async fn test_first_add_adopts_returned_identity() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let engine = engine(
            Replay::default().respond(Ok(MutationEnvelope::ok(cart("cart-1", "line-1", 1)))),
            &store,
        );

        engine.add_item(tee()).await.unwrap();

        assert_eq!(engine.session().await.unwrap().as_str(), "cart-1");
        assert_eq!(
            store.read(keys::CART_SESSION_ID).unwrap().as_deref(),
            Some("cart-1")
        );
        let view = engine.view().await;
        assert_eq!(view.item_count, 1);
        assert_eq!(view.subtotal_display, "server total");
        assert!(view.is_open);
        assert!(!view.is_loading);
        assert_eq!(engine.service.sessions.lock().unwrap()[0], None);
    }

    #[tokio::test]
    async fn test_rejection_keeps_previous_state() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let engine = engine(
            Replay::default()
                .respond(Ok(MutationEnvelope::ok(cart("cart-1", "line-1", 1))))
                .respond(Ok(MutationEnvelope::rejected(vec![
                    "Only 2 left in stock".to_string(),
                ]))),
            &store,
        );
        engine.add_item(tee()).await.unwrap();
        let before = engine.snapshot().await;

        let err = engine.update_quantity("line-1", 5).await.unwrap_err();
        assert!(matches!(&err, CartError::Rejected(m) if m == "Only 2 left in stock"));
        assert_eq!(engine.snapshot().await, before);
        assert_eq!(engine.session().await.unwrap().as_str(), "cart-1");
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_fallback() {
        let err = accept(MutationEnvelope::rejected(Vec::new())).unwrap_err();
        assert_eq!(err.to_string(), FALLBACK_ERROR);
    }

    #[tokio::test]
    async fn test_success_without_cart_is_malformed() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let envelope = MutationEnvelope {
            success: true,
            cart: None,
            errors: Vec::new(),
        };
        let engine = engine(Replay::default().respond(Ok(envelope)), &store);

        let err = engine.add_item(tee()).await.unwrap_err();
        assert!(matches!(err, CartError::MalformedResponse));
        assert!(engine.session().await.is_none());
    }

    #[tokio::test]
    async fn test_remove_rotates_identity() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let mut emptied = cart("cart-2", "line-1", 1);
        emptied.snapshot = CartSnapshot::empty();
        let engine = engine(
            Replay::default()
                .respond(Ok(MutationEnvelope::ok(cart("cart-1", "line-1", 1))))
                .respond(Ok(MutationEnvelope::ok(emptied))),
            &store,
        );
        engine.add_item(tee()).await.unwrap();

        engine.remove_item("line-1").await.unwrap();

        assert_eq!(engine.session().await.unwrap().as_str(), "cart-2");
        assert!(engine.snapshot().await.is_empty);
        let sessions = engine.service.sessions.lock().unwrap().clone();
        assert_eq!(sessions[1].as_deref(), Some("cart-1"));
    }

    #[tokio::test]
    async fn test_non_positive_update_removes() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let engine = engine(
            Replay::default().respond(Ok(MutationEnvelope::ok(cart("cart-1", "line-1", 1)))),
            &store,
        );
        engine.update_quantity("line-1", 0).await.unwrap();
        assert_eq!(engine.service.sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_forgets_identity() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let mut emptied = cart("cart-1", "line-1", 1);
        emptied.snapshot = CartSnapshot::empty();
        let engine = engine(
            Replay::default()
                .respond(Ok(MutationEnvelope::ok(cart("cart-1", "line-1", 1))))
                .respond(Ok(MutationEnvelope::ok(emptied))),
            &store,
        );
        engine.add_item(tee()).await.unwrap();

        engine.clear_cart().await.unwrap();

        assert!(engine.session().await.is_none());
        assert!(store.read(keys::CART_SESSION_ID).unwrap().is_none());
        let view = engine.view().await;
        assert!(view.is_empty);
        assert!(!view.is_open);
    }

    #[tokio::test]
    async fn test_restored_identity_reads_through_refresh() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        store.write(keys::CART_SESSION_ID, "cart-7").unwrap();
        let engine = engine(
            Replay::default().fetch_returns(Some(cart("cart-7", "line-1", 3))),
            &store,
        );

        assert_eq!(engine.snapshot().await.item_count(), 3);
        // Second read is served from cache; the replay has no more fetches.
        assert_eq!(engine.snapshot().await.item_count(), 3);
    }

    #[tokio::test]
    async fn test_refresh_of_vanished_cart_clears_identity() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        store.write(keys::CART_SESSION_ID, "cart-7").unwrap();
        let engine = engine(Replay::default().fetch_returns(None), &store);

        assert!(engine.snapshot().await.is_empty);
        assert!(engine.session().await.is_none());
        assert!(store.read(keys::CART_SESSION_ID).unwrap().is_none());
    }

    #[test]
    fn test_line_ref_is_server_id() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let engine = engine(Replay::default(), &store);
        let item = &cart("cart-1", "line-42", 1).snapshot.items[0];
        assert_eq!(engine.line_ref(item), "line-42");
    }
}
