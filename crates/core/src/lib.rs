//! Cartkeeper Core - Shared cart types and the cart engine contract.
//!
//! This crate provides the types used by every Cartkeeper component:
//! - `storefront` - Cart engines and the HTTP cart surface
//! - `cli` - Command-line tools for inspecting persisted carts
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Variant identity, line items, snapshots, prices and ids
//! - [`contract`] - The [`CartEngine`] trait both cart engines implement

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod contract;
pub mod types;

pub use contract::CartEngine;
pub use types::*;
