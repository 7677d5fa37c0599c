//! Variant identity: a stable key for a configured product.
//!
//! Two line items describe the same purchasable configuration exactly when
//! they share a product id and the same *set* of selected options. The key is
//! built from both, with options sorted so that selection order never
//! matters. Both cart engines use it as the merge key.

use serde::{Deserialize, Serialize};

use crate::define_id;

define_id!(VariantKey);

/// Separates the product id from the option list.
const PRODUCT_SEPARATOR: &str = "::";

/// Separates individual `code=value` pairs.
const OPTION_SEPARATOR: char = '|';

/// One selected configurable option (e.g., color = red).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOption {
    /// Attribute code (e.g., "color", "size").
    pub attribute_code: String,
    /// Selected value as the catalog knows it (e.g., "red", "M").
    pub value: String,
    /// Human-readable label. Display only, never part of the identity.
    #[serde(default)]
    pub label: String,
}

impl SelectedOption {
    /// Create an option whose label equals its value.
    #[must_use]
    pub fn new(attribute_code: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            attribute_code: attribute_code.into(),
            label: value.clone(),
            value,
        }
    }

    /// Set a display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Return the options sorted by attribute code, then value.
///
/// This is the canonical order used both for the variant key and for
/// mutation payloads sent to the remote cart service.
#[must_use]
pub fn normalize_options(options: &[SelectedOption]) -> Vec<SelectedOption> {
    let mut sorted = options.to_vec();
    sorted.sort_by(|a, b| {
        a.attribute_code
            .cmp(&b.attribute_code)
            .then_with(|| a.value.cmp(&b.value))
    });
    sorted
}

/// Compute the variant key for a product and its selected options.
///
/// Deterministic and independent of option order. Never fails: unusual input
/// (empty ids, separators inside values) passes through verbatim.
///
/// ```rust
/// use cartkeeper_core::{SelectedOption, compute_variant_id};
///
/// let key = compute_variant_id("P1", &[SelectedOption::new("color", "red")]);
/// assert_eq!(key.as_str(), "P1::color=red");
/// assert_eq!(compute_variant_id("P2", &[]).as_str(), "P2");
/// ```
#[must_use]
pub fn compute_variant_id(product_id: &str, selected_options: &[SelectedOption]) -> VariantKey {
    if selected_options.is_empty() {
        return VariantKey::new(product_id);
    }

    let mut key = String::with_capacity(product_id.len() + 16 * selected_options.len());
    key.push_str(product_id);
    key.push_str(PRODUCT_SEPARATOR);

    for (i, option) in normalize_options(selected_options).iter().enumerate() {
        if i > 0 {
            key.push(OPTION_SEPARATOR);
        }
        key.push_str(&option.attribute_code);
        key.push('=');
        key.push_str(&option.value);
    }

    VariantKey::new(key)
}
