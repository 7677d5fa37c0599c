//! The consumer contract shared by every cart engine.
//!
//! The UI talks to a cart only through [`CartEngine`]. Which implementation
//! sits behind it is decided once, by the application's data-source policy;
//! callers never branch on the concrete engine.

use std::future::Future;

use crate::types::{CartLineItem, CartSnapshot, CartView, NewCartItem};

/// Operations and derived state every cart engine exposes.
pub trait CartEngine: Send + Sync {
    /// Error surfaced by failed operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current cart contents.
    fn snapshot(&self) -> impl Future<Output = CartSnapshot> + Send;

    /// Add one unit of a configuration, merging with an existing line that
    /// has the same variant key. Opens the cart panel.
    fn add_item(&self, item: NewCartItem) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Set a line's quantity. A quantity of zero or less removes the line.
    fn update_quantity(
        &self,
        line: &str,
        quantity: i64,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Remove a line. Removing a line that is not there is a no-op.
    fn remove_item(&self, line: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Empty the cart.
    fn clear_cart(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Whether the cart panel is open.
    fn is_open(&self) -> bool;

    /// Flip the panel open or closed.
    fn toggle(&self);

    /// Close the panel.
    fn close(&self);

    /// Whether at least one operation is in flight.
    fn is_loading(&self) -> bool;

    /// The reference `update_quantity` and `remove_item` expect for a line.
    ///
    /// Defaults to the variant key; engines with server-assigned line ids
    /// override it.
    fn line_ref<'a>(&self, item: &'a CartLineItem) -> &'a str {
        item.variant_id.as_str()
    }

    /// Snapshot plus UI flags.
    fn view(&self) -> impl Future<Output = CartView> + Send {
        async move {
            // Loading is sampled before the snapshot: a view may show the
            // spinner over fresh data, never a cleared spinner over stale data.
            let is_loading = self.is_loading();
            let snapshot = self.snapshot().await;
            CartView::new(snapshot, self.is_open(), is_loading)
        }
    }
}
