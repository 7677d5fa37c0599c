//! Core types for Cartkeeper.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod id;
pub mod line_item;
pub mod price;
pub mod snapshot;
pub mod variant;

pub use id::{CartSessionId, VisitorId};
pub use line_item::{CartLineItem, NewCartItem};
pub use price::{CurrencyCode, Price};
pub use snapshot::{CartSnapshot, CartView};
pub use variant::{SelectedOption, VariantKey, compute_variant_id, normalize_options};
