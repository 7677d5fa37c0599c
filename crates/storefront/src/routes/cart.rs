//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Handlers hold no cart logic: they resolve the visitor's engine, call the
//! [`CartEngine`] contract, and render the resulting view.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    response::{AppendHeaders, IntoResponse, Response},
};
use cartkeeper_core::{CartEngine, CartView, NewCartItem, SelectedOption};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::cart::{CartError, StorefrontCart};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::Visitor;
use crate::state::AppState;

/// HTMX event fired after every successful mutation.
pub const CART_UPDATED_TRIGGER: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Line display data for templates.
#[derive(Clone)]
pub struct LineView {
    /// What `update` and `remove` expect for this line.
    pub line_ref: String,
    pub name: String,
    /// Option labels, e.g. "Red / M".
    pub options: String,
    pub quantity: u32,
    pub price_display: String,
    pub total_display: String,
    pub image_url: Option<String>,
}

/// Panel display data for templates.
#[derive(Clone)]
pub struct PanelView {
    pub lines: Vec<LineView>,
    pub item_count: u64,
    pub subtotal_display: String,
    pub is_empty: bool,
    pub is_open: bool,
    pub is_loading: bool,
    /// Message from the last failed operation.
    pub error: Option<String>,
}

impl PanelView {
    fn build(cart: &StorefrontCart, view: CartView) -> Self {
        let lines = view
            .items
            .iter()
            .map(|item| LineView {
                line_ref: cart.line_ref(item).to_string(),
                name: item.name.clone(),
                options: item
                    .selected_options
                    .iter()
                    .map(|option| option.label.as_str())
                    .collect::<Vec<_>>()
                    .join(" / "),
                quantity: item.quantity,
                price_display: item.price_display.clone(),
                total_display: item.line_total_display(),
                image_url: item.image_url.clone(),
            })
            .collect();

        Self {
            lines,
            item_count: view.item_count,
            subtotal_display: view.subtotal_display,
            is_empty: view.is_empty,
            is_open: view.is_open,
            is_loading: view.is_loading,
            error: None,
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
///
/// `options` is `code=value` pairs joined by `|`, optionally with a label
/// after a second `=` (`color=red=Cherry`).
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub options: String,
    pub image_url: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line: String,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line: String,
}

/// Parse the `options` field of [`AddToCartForm`].
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a pair without `=` or with an empty code.
pub fn parse_options(raw: &str) -> Result<Vec<SelectedOption>> {
    raw.split('|')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(3, '=');
            let code = parts.next().unwrap_or_default().trim();
            let value = parts
                .next()
                .ok_or_else(|| AppError::BadRequest(format!("option `{pair}` has no value")))?
                .trim();
            if code.is_empty() {
                return Err(AppError::BadRequest(format!("option `{pair}` has no code")));
            }
            let option = SelectedOption::new(code, value);
            Ok(match parts.next() {
                Some(label) => option.with_label(label.trim()),
                None => option,
            })
        })
        .collect()
}

impl AddToCartForm {
    fn into_item(self) -> Result<NewCartItem> {
        let mut item = NewCartItem::new(self.product_id, self.sku, self.name, self.price);
        item.selected_options = parse_options(&self.options)?;
        item.image_url = self.image_url.filter(|url| !url.is_empty());
        Ok(item)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub panel: PanelView,
    pub count: u64,
}

/// Cart panel fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_panel.html")]
pub struct CartPanelTemplate {
    pub panel: PanelView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u64,
}

async fn render_panel(cart: &StorefrontCart) -> CartPanelTemplate {
    let view = cart.view().await;
    CartPanelTemplate {
        panel: PanelView::build(cart, view),
    }
}

/// Render the outcome of a mutation.
///
/// Success answers with the fresh panel and the `cart-updated` trigger. A
/// rejection keeps the previous contents and shows the server's message.
/// Any other failure is a gateway error.
async fn settle(
    cart: &StorefrontCart,
    outcome: std::result::Result<(), CartError>,
) -> Result<Response> {
    match outcome {
        Ok(()) => Ok((
            AppendHeaders([CART_UPDATED_TRIGGER]),
            render_panel(cart).await,
        )
            .into_response()),
        Err(CartError::Rejected(message)) => {
            let mut template = render_panel(cart).await;
            template.panel.error = Some(message);
            Ok(template.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn cart_for(state: &AppState, visitor: &Visitor) -> Arc<StorefrontCart> {
    state.carts().cart_for(&visitor.0).await
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn show(State(state): State<AppState>, visitor: Visitor) -> impl IntoResponse {
    let cart = cart_for(&state, &visitor).await;
    let view = cart.view().await;
    CartShowTemplate {
        count: view.item_count,
        panel: PanelView::build(&cart, view),
    }
}

/// Cart panel fragment (HTMX).
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn panel(State(state): State<AppState>, visitor: Visitor) -> impl IntoResponse {
    let cart = cart_for(&state, &visitor).await;
    render_panel(&cart).await
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn count(State(state): State<AppState>, visitor: Visitor) -> impl IntoResponse {
    let cart = cart_for(&state, &visitor).await;
    CartCountTemplate {
        count: cart.snapshot().await.item_count(),
    }
}

/// The consumer view as JSON.
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn json(State(state): State<AppState>, visitor: Visitor) -> Json<CartView> {
    Json(cart_for(&state, &visitor).await.view().await)
}

/// Add one unit of a configuration (HTMX).
#[instrument(skip(state, visitor, form), fields(visitor = %visitor.0, sku = %form.sku))]
pub async fn add(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let item = form.into_item()?;
    add_breadcrumb("cart", "Added item", &[("sku", &item.sku)]);
    let cart = cart_for(&state, &visitor).await;
    let outcome = cart.add_item(item).await;
    settle(&cart, outcome).await
}

/// Update cart line quantity (HTMX).
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn update(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let cart = cart_for(&state, &visitor).await;
    let outcome = cart.update_quantity(&form.line, form.quantity).await;
    settle(&cart, outcome).await
}

/// Remove a cart line (HTMX).
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn remove(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let cart = cart_for(&state, &visitor).await;
    let outcome = cart.remove_item(&form.line).await;
    settle(&cart, outcome).await
}

/// Remove every line (HTMX).
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn clear(State(state): State<AppState>, visitor: Visitor) -> Result<Response> {
    add_breadcrumb("cart", "Cleared cart", &[]);
    let cart = cart_for(&state, &visitor).await;
    let outcome = cart.clear_cart().await;
    settle(&cart, outcome).await
}

/// Flip panel visibility (HTMX).
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn toggle(State(state): State<AppState>, visitor: Visitor) -> impl IntoResponse {
    let cart = cart_for(&state, &visitor).await;
    cart.toggle();
    render_panel(&cart).await
}

/// Hide the panel (HTMX).
#[instrument(skip(state, visitor), fields(visitor = %visitor.0))]
pub async fn close(State(state): State<AppState>, visitor: Visitor) -> impl IntoResponse {
    let cart = cart_for(&state, &visitor).await;
    cart.close();
    render_panel(&cart).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let options = parse_options("size=M | color=red=Cherry").unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].attribute_code, "size");
        assert_eq!(options[0].label, "M");
        assert_eq!(options[1].value, "red");
        assert_eq!(options[1].label, "Cherry");
    }

    #[test]
    fn test_parse_options_empty() {
        assert!(parse_options("").unwrap().is_empty());
        assert!(parse_options(" | ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_options_rejects_malformed_pairs() {
        assert!(matches!(parse_options("color"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_options("=red"), Err(AppError::BadRequest(_))));
    }
}
