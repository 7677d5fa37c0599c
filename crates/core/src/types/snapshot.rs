//! Whole-cart views exposed to consumers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::line_item::CartLineItem;
use crate::types::price::{CurrencyCode, Price};

/// The cart's contents at one point in time.
///
/// `subtotal` has two origins. A local cart derives it from its items every
/// time a snapshot is taken. A remote cart copies it verbatim from the last
/// server response and never recomputes it: pricing and promotions belong to
/// the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Lines in display order.
    pub items: Vec<CartLineItem>,
    /// Cart subtotal.
    pub subtotal: Price,
    /// Formatted subtotal.
    pub subtotal_display: String,
    /// Whether the cart has no lines.
    pub is_empty: bool,
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::derived(Vec::new())
    }

    /// Build a snapshot whose totals are computed from the items.
    #[must_use]
    pub fn derived(items: Vec<CartLineItem>) -> Self {
        let amount: Decimal = items.iter().map(CartLineItem::line_total).sum();
        let subtotal = Price::new(amount, CurrencyCode::default());
        Self {
            is_empty: items.is_empty(),
            subtotal_display: subtotal.display(),
            subtotal,
            items,
        }
    }

    /// Build a snapshot from server-reported totals, taken as-is.
    #[must_use]
    pub const fn authoritative(
        items: Vec<CartLineItem>,
        subtotal: Price,
        subtotal_display: String,
        is_empty: bool,
    ) -> Self {
        Self {
            items,
            subtotal,
            subtotal_display,
            is_empty,
        }
    }

    /// Total number of units across all lines.
    ///
    /// Summed in `u64` so lines at `u32::MAX` cannot overflow the count.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

/// The full consumer contract: cart contents plus panel and loading state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    /// Lines in display order.
    pub items: Vec<CartLineItem>,
    /// Always `sum(items[].quantity)`.
    pub item_count: u64,
    /// Subtotal (derived locally or reported by the server).
    pub subtotal: Price,
    /// Formatted subtotal.
    pub subtotal_display: String,
    /// Whether the cart has no lines.
    pub is_empty: bool,
    /// Whether the cart panel is open.
    pub is_open: bool,
    /// Whether at least one operation was in flight when the view was taken.
    pub is_loading: bool,
}

impl CartView {
    /// Combine a snapshot with the UI flags.
    #[must_use]
    pub fn new(snapshot: CartSnapshot, is_open: bool, is_loading: bool) -> Self {
        Self {
            item_count: snapshot.item_count(),
            items: snapshot.items,
            subtotal: snapshot.subtotal,
            subtotal_display: snapshot.subtotal_display,
            is_empty: snapshot.is_empty,
            is_open,
            is_loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::line_item::NewCartItem;
    use crate::types::variant::SelectedOption;

    fn line(product: &str, cents: i64, quantity: u32) -> CartLineItem {
        NewCartItem::new(product, product, product, Decimal::new(cents, 2)).into_line(quantity)
    }

    #[test]
    fn test_derived_totals() {
        let snapshot = CartSnapshot::derived(vec![line("A", 1000, 2), line("B", 250, 3)]);
        assert_eq!(snapshot.item_count(), 5);
        assert_eq!(snapshot.subtotal.amount, Decimal::new(2750, 2));
        assert_eq!(snapshot.subtotal_display, "$27.50");
        assert!(!snapshot.is_empty);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CartSnapshot::empty();
        assert!(snapshot.is_empty);
        assert_eq!(snapshot.item_count(), 0);
        assert_eq!(snapshot.subtotal_display, "$0.00");
    }

    #[test]
    fn test_authoritative_totals_are_not_recomputed() {
        let items = vec![line("A", 1000, 2)];
        let reported = Price::new(Decimal::new(1500, 2), CurrencyCode::USD);
        let snapshot =
            CartSnapshot::authoritative(items, reported, "$15.00 (promo)".to_string(), false);

        assert_eq!(snapshot.subtotal.amount, Decimal::new(1500, 2));
        assert_eq!(snapshot.subtotal_display, "$15.00 (promo)");
    }

    #[test]
    fn test_view_item_count_matches_quantities() {
        let item = NewCartItem::new("P1", "P1", "Tee", Decimal::ONE)
            .with_option(SelectedOption::new("size", "M"))
            .into_line(4);
        let view = CartView::new(CartSnapshot::derived(vec![item]), true, false);

        assert_eq!(view.item_count, 4);
        assert!(view.is_open);
        assert!(!view.is_loading);
    }

    #[test]
    fn test_item_count_does_not_overflow_at_max_quantity() {
        let snapshot =
            CartSnapshot::derived(vec![line("A", 100, u32::MAX), line("B", 100, u32::MAX)]);
        assert_eq!(snapshot.item_count(), 2 * u64::from(u32::MAX));
    }
}
