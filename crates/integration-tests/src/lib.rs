//! Integration test support for Cartkeeper.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartkeeper-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `local_cart` - Local engine against file-backed storage
//! - `synced_cart` - Synced engine against a scripted cart service
//! - `cart_routes` - HTTP surface through the axum router
//!
//! [`ScriptedCartService`] parks every request until the test answers it,
//! so tests decide the order in which responses arrive.

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::Path;

use cartkeeper_core::{CartLineItem, CartSessionId, CartSnapshot, NewCartItem, SelectedOption};
use cartkeeper_storefront::cart_api::{
    AddLineInput, CartService, MutationEnvelope, RemoteCart, RemoveLineInput, ServiceError,
    UpdateLineInput,
};
use cartkeeper_storefront::config::StorefrontConfig;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};

/// The request a [`PendingCall`] is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Add(AddLineInput),
    Update(UpdateLineInput),
    Remove(RemoveLineInput),
    Clear,
    Fetch,
}

enum Reply {
    Mutation(Result<MutationEnvelope, ServiceError>),
    Fetch(Result<Option<RemoteCart>, ServiceError>),
}

/// A request parked in the scripted service.
pub struct PendingCall {
    /// What was asked.
    pub kind: CallKind,
    /// Cart session token the request carried.
    pub session: Option<String>,
    reply: oneshot::Sender<Reply>,
}

impl PendingCall {
    /// Answer a mutation with a successful envelope carrying `cart`.
    pub fn succeed(self, cart: RemoteCart) {
        self.answer(Reply::Mutation(Ok(MutationEnvelope::ok(cart))));
    }

    /// Answer a mutation with a business-rule rejection.
    pub fn reject(self, errors: &[&str]) {
        let errors = errors.iter().map(ToString::to_string).collect();
        self.answer(Reply::Mutation(Ok(MutationEnvelope::rejected(errors))));
    }

    /// Answer a mutation with a transport failure.
    pub fn fail(self, error: ServiceError) {
        self.answer(Reply::Mutation(Err(error)));
    }

    /// Answer a fetch.
    pub fn found(self, cart: Option<RemoteCart>) {
        self.answer(Reply::Fetch(Ok(cart)));
    }

    fn answer(self, reply: Reply) {
        // The caller may have given up; nothing to do then.
        let _ = self.reply.send(reply);
    }
}

/// Receiving end of a [`ScriptedCartService`].
pub struct CallQueue {
    calls: mpsc::UnboundedReceiver<PendingCall>,
}

impl CallQueue {
    /// Wait for the next request.
    pub async fn next(&mut self) -> PendingCall {
        self.calls
            .recv()
            .await
            .expect("scripted cart service dropped")
    }

    /// Whether no request is currently parked.
    pub fn is_idle(&self) -> bool {
        self.calls.is_empty()
    }
}

/// In-memory [`CartService`] whose responses are supplied by the test.
#[derive(Clone)]
pub struct ScriptedCartService {
    calls: mpsc::UnboundedSender<PendingCall>,
}

impl ScriptedCartService {
    /// A service and the queue its requests arrive on.
    #[must_use]
    pub fn channel() -> (Self, CallQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { calls: tx }, CallQueue { calls: rx })
    }

    async fn park(&self, kind: CallKind, session: Option<&CartSessionId>) -> Reply {
        let (tx, rx) = oneshot::channel();
        let call = PendingCall {
            kind,
            session: session.map(|s| s.as_str().to_string()),
            reply: tx,
        };
        if self.calls.send(call).is_err() {
            return Reply::Mutation(Err(unanswered()));
        }
        rx.await.unwrap_or_else(|_| Reply::Mutation(Err(unanswered())))
    }

    async fn mutation(
        &self,
        kind: CallKind,
        session: Option<&CartSessionId>,
    ) -> Result<MutationEnvelope, ServiceError> {
        match self.park(kind, session).await {
            Reply::Mutation(result) => result,
            Reply::Fetch(_) => Err(unanswered()),
        }
    }
}

fn unanswered() -> ServiceError {
    ServiceError::Status {
        status: 503,
        body: "no scripted answer".to_string(),
    }
}

impl CartService for ScriptedCartService {
    async fn add_item(
        &self,
        session: Option<&CartSessionId>,
        input: AddLineInput,
    ) -> Result<MutationEnvelope, ServiceError> {
        self.mutation(CallKind::Add(input), session).await
    }

    async fn update_item(
        &self,
        session: Option<&CartSessionId>,
        input: UpdateLineInput,
    ) -> Result<MutationEnvelope, ServiceError> {
        self.mutation(CallKind::Update(input), session).await
    }

    async fn remove_item(
        &self,
        session: Option<&CartSessionId>,
        input: RemoveLineInput,
    ) -> Result<MutationEnvelope, ServiceError> {
        self.mutation(CallKind::Remove(input), session).await
    }

    async fn clear(
        &self,
        session: Option<&CartSessionId>,
    ) -> Result<MutationEnvelope, ServiceError> {
        self.mutation(CallKind::Clear, session).await
    }

    async fn fetch(&self, session: &CartSessionId) -> Result<Option<RemoteCart>, ServiceError> {
        match self.park(CallKind::Fetch, Some(session)).await {
            Reply::Fetch(result) => result,
            Reply::Mutation(_) => Err(unanswered()),
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A t-shirt in the given color and size.
#[must_use]
pub fn tee(color: &str, size: &str) -> NewCartItem {
    NewCartItem::new("TSHIRT", format!("TSHIRT-{color}-{size}"), "T-shirt", Decimal::new(1250, 2))
        .with_option(SelectedOption::new("color", color))
        .with_option(SelectedOption::new("size", size))
}

/// A server line with a server-assigned id.
#[must_use]
pub fn server_line(line_id: &str, item: NewCartItem, quantity: u32) -> CartLineItem {
    let mut line = item.into_line(quantity);
    line.id = line_id.to_string();
    line
}

/// A server cart filed under `id`, with totals as the server would report.
#[must_use]
pub fn server_cart(id: &str, lines: Vec<CartLineItem>) -> RemoteCart {
    let derived = CartSnapshot::derived(lines);
    RemoteCart {
        id: CartSessionId::new(id),
        snapshot: CartSnapshot::authoritative(
            derived.items,
            derived.subtotal,
            derived.subtotal_display,
            derived.is_empty,
        ),
    }
}

/// Local-backend configuration storing carts under `storage_dir`.
#[must_use]
pub fn local_config(storage_dir: &Path) -> StorefrontConfig {
    let env: HashMap<&str, String> = HashMap::from([
        ("CART_BASE_URL", "http://localhost:3000".to_string()),
        ("CART_STORAGE_DIR", storage_dir.display().to_string()),
        ("CART_SYNTHETIC_DELAY_MS", "0".to_string()),
    ]);
    StorefrontConfig::from_source(&|key| env.get(key).cloned())
        .expect("test configuration is valid")
}
