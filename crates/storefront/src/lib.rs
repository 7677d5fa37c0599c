//! Cartkeeper storefront library.
//!
//! Cart engines, durable storage, the remote cart service client, and the
//! HTMX cart surface. The binary in `main.rs` only wires these together, so
//! everything here can be driven directly from tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod cart_api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod storage;

use axum::Router;

use crate::state::AppState;

/// Build the full application router with sessions attached.
///
/// Sentry and tracing layers are added by the binary; tests drive this
/// router directly.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());
    routes::routes().layer(session_layer).with_state(state)
}
