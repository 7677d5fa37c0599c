//! Cart engines.
//!
//! Two interchangeable implementations of [`CartEngine`]:
//!
//! - [`LocalCart`]: the cart lives in durable storage on this side of the
//!   wire and totals are derived from its items.
//! - [`SyncedCart`]: the remote cart service owns the cart; this side keeps
//!   the session identity and a write-through snapshot cache.
//!
//! [`StorefrontCart`] holds whichever one the configured backend selects so the
//! HTTP surface never needs to know which is in use.

mod flags;
mod local;
mod synced;

use std::sync::Arc;

use cartkeeper_core::{CartEngine, CartLineItem, CartSnapshot, NewCartItem};
use thiserror::Error;

use crate::cart_api::{CartService, GraphQlCartService, ServiceError};
use crate::storage::DurableStore;

pub use local::LocalCart;
pub use synced::{FALLBACK_ERROR, SyncedCart};

/// A cart operation that did not take effect.
#[derive(Debug, Error)]
pub enum CartError {
    /// The server refused the mutation; the message is shown to the shopper.
    #[error("{0}")]
    Rejected(String),

    /// The server reported success but sent no cart.
    #[error("Cart service reported success without a cart")]
    MalformedResponse,

    /// The request never produced an answer.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl CartError {
    /// Message suitable for showing to a shopper.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected(message) => message,
            Self::MalformedResponse | Self::Service(_) => FALLBACK_ERROR,
        }
    }
}

/// The engine selected by the data-source policy.
pub enum StorefrontCart<S = GraphQlCartService> {
    Local(LocalCart),
    Synced(SyncedCart<S>),
}

impl<S: CartService> StorefrontCart<S> {
    /// Convenience for building a local cart over `store`.
    #[must_use]
    pub fn local(store: Arc<dyn DurableStore>, delay: std::time::Duration) -> Self {
        Self::Local(LocalCart::load(store, delay))
    }
}

impl<S: CartService> CartEngine for StorefrontCart<S> {
    type Error = CartError;

    async fn snapshot(&self) -> CartSnapshot {
        match self {
            Self::Local(cart) => cart.snapshot().await,
            Self::Synced(cart) => cart.snapshot().await,
        }
    }

    async fn add_item(&self, item: NewCartItem) -> Result<(), CartError> {
        match self {
            Self::Local(cart) => cart.add_item(item).await.map_err(|never| match never {}),
            Self::Synced(cart) => cart.add_item(item).await,
        }
    }

    async fn update_quantity(&self, line: &str, quantity: i64) -> Result<(), CartError> {
        match self {
            Self::Local(cart) => cart
                .update_quantity(line, quantity)
                .await
                .map_err(|never| match never {}),
            Self::Synced(cart) => cart.update_quantity(line, quantity).await,
        }
    }

    async fn remove_item(&self, line: &str) -> Result<(), CartError> {
        match self {
            Self::Local(cart) => cart.remove_item(line).await.map_err(|never| match never {}),
            Self::Synced(cart) => cart.remove_item(line).await,
        }
    }

    async fn clear_cart(&self) -> Result<(), CartError> {
        match self {
            Self::Local(cart) => cart.clear_cart().await.map_err(|never| match never {}),
            Self::Synced(cart) => cart.clear_cart().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Local(cart) => cart.is_open(),
            Self::Synced(cart) => cart.is_open(),
        }
    }

    fn toggle(&self) {
        match self {
            Self::Local(cart) => cart.toggle(),
            Self::Synced(cart) => cart.toggle(),
        }
    }

    fn close(&self) {
        match self {
            Self::Local(cart) => cart.close(),
            Self::Synced(cart) => cart.close(),
        }
    }

    fn is_loading(&self) -> bool {
        match self {
            Self::Local(cart) => cart.is_loading(),
            Self::Synced(cart) => cart.is_loading(),
        }
    }

    fn line_ref<'a>(&self, item: &'a CartLineItem) -> &'a str {
        match self {
            Self::Local(cart) => cart.line_ref(item),
            Self::Synced(cart) => cart.line_ref(item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_transport_details() {
        let err = CartError::Service(ServiceError::RateLimited(5));
        assert_eq!(err.user_message(), FALLBACK_ERROR);

        let err = CartError::Rejected("Out of stock".to_string());
        assert_eq!(err.user_message(), "Out of stock");
        assert_eq!(err.to_string(), "Out of stock");
    }
}
