//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! GET  /cart/panel             - Cart panel (fragment)
//! GET  /cart/count             - Cart count badge (fragment)
//! GET  /cart.json              - Cart view as JSON
//! POST /cart/add               - Add one unit (returns panel, triggers cart-updated)
//! POST /cart/update            - Set quantity (returns panel, triggers cart-updated)
//! POST /cart/remove            - Remove line (returns panel, triggers cart-updated)
//! POST /cart/clear             - Remove all lines (returns panel, triggers cart-updated)
//! POST /cart/toggle            - Flip panel visibility (returns panel)
//! POST /cart/close             - Hide panel (returns panel)
//! ```

pub mod cart;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/panel", get(cart::panel))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/toggle", post(cart::toggle))
        .route("/close", post(cart::close))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/cart.json", get(cart::json))
        .nest("/cart", cart_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
