//! Cart line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::price::{CurrencyCode, Price};
use crate::types::variant::{SelectedOption, VariantKey, compute_variant_id};

/// One purchasable configuration in the cart.
///
/// This is also the exact record shape persisted by the local cart, so field
/// names are serialized in camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Catalog entry id (local cart) or server-assigned line id (remote cart).
    pub id: String,
    /// Product id the configuration belongs to.
    pub product_id: String,
    /// Catalog identifier of the specific configuration.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Always positive. Zero is never stored; it means "delete the line".
    pub quantity: u32,
    /// Unit price.
    pub price_value: Decimal,
    /// Formatted unit price (e.g., "$12.50").
    pub price_display: String,
    /// Server-computed line total (remote cart only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_value: Option<Decimal>,
    /// Formatted server line total (remote cart only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_display: Option<String>,
    /// Selected options; may be empty.
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
    /// Variant key derived from `product_id` and `selected_options`.
    pub variant_id: VariantKey,
    /// Thumbnail URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartLineItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price_value * Decimal::from(self.quantity)
    }

    /// Line total for display: the server's figure when present, otherwise
    /// derived locally.
    #[must_use]
    pub fn line_total_display(&self) -> String {
        self.total_display.clone().unwrap_or_else(|| {
            Price::new(self.line_total(), CurrencyCode::default()).display()
        })
    }
}

/// A configuration the shopper asked to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCartItem {
    /// Catalog entry id.
    pub id: String,
    /// Product id.
    pub product_id: String,
    /// Catalog identifier of the chosen configuration.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price_value: Decimal,
    /// Selected options; may be empty.
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
    /// Precomputed variant key. Computed from product and options when absent.
    #[serde(default)]
    pub variant_id: Option<VariantKey>,
    /// Thumbnail URL.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewCartItem {
    /// Create an item with no options.
    #[must_use]
    pub fn new(
        product_id: impl Into<String>,
        sku: impl Into<String>,
        name: impl Into<String>,
        price_value: Decimal,
    ) -> Self {
        let product_id = product_id.into();
        Self {
            id: product_id.clone(),
            product_id,
            sku: sku.into(),
            name: name.into(),
            price_value,
            selected_options: Vec::new(),
            variant_id: None,
            image_url: None,
        }
    }

    /// Add a selected option.
    #[must_use]
    pub fn with_option(mut self, option: SelectedOption) -> Self {
        self.selected_options.push(option);
        self
    }

    /// The variant key, either supplied or computed.
    #[must_use]
    pub fn variant_key(&self) -> VariantKey {
        self.variant_id
            .clone()
            .unwrap_or_else(|| compute_variant_id(&self.product_id, &self.selected_options))
    }

    /// Build a cart line with the given quantity.
    #[must_use]
    pub fn into_line(self, quantity: u32) -> CartLineItem {
        let variant_id = self.variant_key();
        let price_display = Price::new(self.price_value, CurrencyCode::default()).display();
        CartLineItem {
            id: self.id,
            product_id: self.product_id,
            sku: self.sku,
            name: self.name,
            quantity,
            price_value: self.price_value,
            price_display,
            total_value: None,
            total_display: None,
            selected_options: self.selected_options,
            variant_id,
            image_url: self.image_url,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_into_line_computes_variant_and_display() {
        let line = NewCartItem::new("P1", "P1-RED", "Tee", Decimal::new(1250, 2))
            .with_option(SelectedOption::new("color", "red"))
            .into_line(1);

        assert_eq!(line.variant_id.as_str(), "P1::color=red");
        assert_eq!(line.price_display, "$12.50");
        assert_eq!(line.quantity, 1);
    }

    #[test]
    fn test_supplied_variant_key_wins() {
        let mut item = NewCartItem::new("P1", "P1", "Tee", Decimal::ONE);
        item.variant_id = Some(VariantKey::new("custom"));
        assert_eq!(item.variant_key().as_str(), "custom");
    }

    #[test]
    fn test_line_total_display_prefers_server_figure() {
        let mut line = NewCartItem::new("P1", "P1", "Tee", Decimal::new(500, 2)).into_line(3);
        assert_eq!(line.line_total_display(), "$15.00");

        line.total_display = Some("$13.50".to_string());
        assert_eq!(line.line_total_display(), "$13.50");
    }

    #[test]
    fn test_persisted_shape_is_camel_case() {
        let line = NewCartItem::new("P1", "SKU-1", "Tee", Decimal::ONE).into_line(2);
        let json = serde_json::to_value(&line).unwrap();

        assert_eq!(json["productId"], "P1");
        assert_eq!(json["variantId"], "P1");
        assert_eq!(json["priceDisplay"], "$1.00");
        assert!(json.get("totalValue").is_none());
    }
}
