//! Client-resident cart persisted to durable storage.
//!
//! The in-memory item list is the source of truth. Every change is written
//! through to [`keys::CART_ITEMS`] as a JSON array. There is no network; each
//! operation waits out a short synthetic delay so callers see the same
//! asynchronous contract as the remote cart.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cartkeeper_core::{CartEngine, CartLineItem, CartSnapshot, NewCartItem};
use tracing::{debug, instrument, warn};

use super::flags::UiFlags;
use crate::storage::{DurableStore, keys};

/// A cart that lives entirely on this side of the wire.
pub struct LocalCart {
    store: Arc<dyn DurableStore>,
    items: Mutex<Vec<CartLineItem>>,
    flags: UiFlags,
    delay: Duration,
}

impl LocalCart {
    /// Restore a cart from `store`, or start empty.
    ///
    /// Missing, corrupt or non-array data yields an empty cart; corruption is
    /// logged, never returned.
    #[must_use]
    pub fn load(store: Arc<dyn DurableStore>, delay: Duration) -> Self {
        let items = read_items(store.as_ref());
        debug!(lines = items.len(), "Local cart restored");
        Self {
            store,
            items: Mutex::new(items),
            flags: UiFlags::default(),
            delay,
        }
    }

    fn lock_items(&self) -> std::sync::MutexGuard<'_, Vec<CartLineItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `change` against the item list after the synthetic delay, then
    /// write the result through to storage.
    async fn run(&self, change: impl FnOnce(&mut Vec<CartLineItem>) + Send) {
        self.flags.begin();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        {
            let mut items = self.lock_items();
            change(&mut items);
            self.persist(&items);
        }
        self.flags.settle();
    }

    fn persist(&self, items: &[CartLineItem]) {
        let json = match serde_json::to_string(items) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cart items");
                return;
            }
        };
        if let Err(e) = self.store.write(keys::CART_ITEMS, &json) {
            warn!(error = %e, "Failed to persist cart items");
        }
    }
}

impl CartEngine for LocalCart {
    type Error = Infallible;

    async fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::derived(self.lock_items().clone())
    }

    #[instrument(skip(self, item), fields(sku = %item.sku))]
    async fn add_item(&self, item: NewCartItem) -> Result<(), Infallible> {
        self.flags.open();
        let variant_id = item.variant_key();
        self.run(move |items| {
            if let Some(existing) = items.iter_mut().find(|i| i.variant_id == variant_id) {
                existing.quantity = existing.quantity.saturating_add(1);
            } else {
                let mut item = item;
                item.variant_id = Some(variant_id);
                items.push(item.into_line(1));
            }
        })
        .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_quantity(&self, line: &str, quantity: i64) -> Result<(), Infallible> {
        if quantity <= 0 {
            return self.remove_item(line).await;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.run(|items| {
            if let Some(existing) = items.iter_mut().find(|i| i.variant_id.as_str() == line) {
                existing.quantity = quantity;
            }
        })
        .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_item(&self, line: &str) -> Result<(), Infallible> {
        self.run(|items| items.retain(|i| i.variant_id.as_str() != line))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), Infallible> {
        self.run(Vec::clear).await;
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
}

/// Read and normalize the persisted item list.
///
/// Records that fail to parse are skipped individually. Duplicate variant
/// keys are merged so at most one line per variant survives.
fn read_items(store: &dyn DurableStore) -> Vec<CartLineItem> {
    let raw = match store.read(keys::CART_ITEMS) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read persisted cart, starting empty");
            return Vec::new();
        }
    };

    let records: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "Persisted cart is not a JSON array, starting empty");
            return Vec::new();
        }
    };

    let mut items: Vec<CartLineItem> = Vec::with_capacity(records.len());
    for record in records {
        let item: CartLineItem = match serde_json::from_value(record) {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable cart record");
                continue;
            }
        };
        if item.quantity == 0 {
            continue;
        }
        match items.iter_mut().find(|i| i.variant_id == item.variant_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }
    items
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartkeeper_core::SelectedOption;
    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::MemoryStore;

    fn red_tee() -> NewCartItem {
        NewCartItem::new("P1", "P1-RED", "Tee", Decimal::new(1250, 2))
            .with_option(SelectedOption::new("color", "red"))
    }

    fn cart_with(store: &Arc<dyn DurableStore>) -> LocalCart {
        LocalCart::load(Arc::clone(store), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_repeated_add_merges_into_one_line() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let cart = cart_with(&store);

        cart.add_item(red_tee()).await.unwrap();
        cart.add_item(red_tee()).await.unwrap();

        let view = cart.view().await;
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].variant_id.as_str(), "P1::color=red");
        assert_eq!(view.items[0].quantity, 2);
        assert_eq!(view.item_count, 2);
        assert!(view.is_open);
        assert!(!view.is_loading);
    }

    #[tokio::test]
    async fn test_zero_and_negative_quantity_remove_the_line() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let zero = cart_with(&store);
        zero.add_item(red_tee()).await.unwrap();
        zero.update_quantity("P1::color=red", 0).await.unwrap();
        assert!(zero.snapshot().await.is_empty);

        let negative = cart_with(&(Arc::new(MemoryStore::new()) as Arc<dyn DurableStore>));
        negative.add_item(red_tee()).await.unwrap();
        negative.update_quantity("P1::color=red", -1).await.unwrap();
        assert!(negative.snapshot().await.is_empty);
    }

    #[tokio::test]
    async fn test_update_replaces_quantity() {
        let cart = cart_with(&(Arc::new(MemoryStore::new()) as Arc<dyn DurableStore>));
        cart.add_item(red_tee()).await.unwrap();
        cart.update_quantity("P1::color=red", 7).await.unwrap();

        let snapshot = cart.snapshot().await;
        assert_eq!(snapshot.item_count(), 7);
        assert_eq!(snapshot.subtotal_display, "$87.50");
    }

    #[tokio::test]
    async fn test_huge_quantities_clamp_and_count_without_overflow() {
        let cart = cart_with(&(Arc::new(MemoryStore::new()) as Arc<dyn DurableStore>));
        cart.add_item(red_tee()).await.unwrap();
        cart.add_item(NewCartItem::new("P2", "P2", "Cap", Decimal::ONE))
            .await
            .unwrap();
        cart.update_quantity("P1::color=red", i64::MAX).await.unwrap();
        cart.update_quantity("P2", i64::MAX).await.unwrap();

        let view = cart.view().await;
        assert!(view.items.iter().all(|item| item.quantity == u32::MAX));
        assert_eq!(view.item_count, 2 * u64::from(u32::MAX));
    }

    #[tokio::test]
    async fn test_remove_missing_line_is_noop() {
        let cart = cart_with(&(Arc::new(MemoryStore::new()) as Arc<dyn DurableStore>));
        cart.add_item(red_tee()).await.unwrap();
        let before = cart.snapshot().await;

        cart.remove_item("P9::size=XL").await.unwrap();
        assert_eq!(cart.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_clear_empties_and_closes() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let cart = cart_with(&store);
        cart.add_item(red_tee()).await.unwrap();

        cart.clear_cart().await.unwrap();
        let view = cart.view().await;
        assert!(view.is_empty);
        assert!(!view.is_open);
        assert_eq!(store.read(keys::CART_ITEMS).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_corrupt_storage_starts_empty() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        store.write(keys::CART_ITEMS, "{not json").unwrap();
        assert!(read_items(store.as_ref()).is_empty());

        store.write(keys::CART_ITEMS, r#"{"an":"object"}"#).unwrap();
        assert!(read_items(store.as_ref()).is_empty());
    }

    #[test]
    fn test_load_merges_duplicates_and_skips_bad_records() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let line = red_tee().into_line(2);
        let mut json = serde_json::to_value(vec![line.clone(), line]).unwrap();
        json.as_array_mut()
            .unwrap()
            .push(serde_json::json!({"garbage": true}));
        store.write(keys::CART_ITEMS, &json.to_string()).unwrap();

        let items = read_items(store.as_ref());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_loading_flag_is_set_during_delay() {
        let cart = Arc::new(LocalCart::load(
            Arc::new(MemoryStore::new()),
            Duration::from_millis(50),
        ));

        let task = {
            let cart = Arc::clone(&cart);
            tokio::spawn(async move { cart.add_item(red_tee()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cart.is_loading());
        assert!(cart.is_open());

        task.await.unwrap().unwrap();
        assert!(!cart.is_loading());
        assert_eq!(cart.snapshot().await.item_count(), 1);
    }
}
