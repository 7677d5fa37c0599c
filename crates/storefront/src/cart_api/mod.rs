//! Client side of the remote cart service.
//!
//! # Architecture
//!
//! - The remote service owns the cart: pricing, tax, inventory and promotions
//!   all happen there. This module only carries requests and responses.
//! - Every call carries the current cart session token as request context
//!   (the `X-Cart-Session` header). The very first add has no token.
//! - Every mutation answers with an envelope:
//!   `{ success, cart: Cart | null, errors: [String] }`.
//! - [`GraphQlCartService`] talks to the real endpoint via `graphql_client`
//!   request bodies sent with `reqwest`.

mod client;
mod conversions;
pub mod queries;

use std::future::Future;

use cartkeeper_core::{CartSessionId, CartSnapshot, SelectedOption};
use serde::Serialize;
use thiserror::Error;

pub use client::GraphQlCartService;

/// Errors that can occur when talking to the remote cart service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// GraphQL response carried errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the cart service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// A GraphQL error returned by the cart service.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Path to the error in the response.
    pub path: Vec<String>,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| match (e.message.is_empty(), e.path.is_empty()) {
            (false, true) => e.message.clone(),
            (false, false) => format!("{} path: {}", e.message, e.path.join(".")),
            (true, false) => format!("path: {}", e.path.join(".")),
            (true, true) => format!("[error {}]: (no details)", i + 1),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Mutation inputs
// =============================================================================

/// One option in an add payload. Labels are display-only and not sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    pub attribute_code: String,
    pub value: String,
}

impl From<&SelectedOption> for OptionInput {
    fn from(option: &SelectedOption) -> Self {
        Self {
            attribute_code: option.attribute_code.clone(),
            value: option.value.clone(),
        }
    }
}

/// Add one unit of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineInput {
    /// Product id.
    pub product_id: String,
    /// Catalog identifier of the chosen configuration.
    pub sku: String,
    /// Always 1; repeated adds increment server-side.
    pub quantity: u32,
    /// Options in canonical (sorted) order.
    pub selected_options: Vec<OptionInput>,
}

/// Set the quantity of a server line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLineInput {
    pub cart_item_id: String,
    pub quantity: u32,
}

/// Remove a server line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLineInput {
    pub cart_item_id: String,
}

// =============================================================================
// Responses
// =============================================================================

/// A server cart: its session token and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCart {
    /// Session token the server filed this cart under.
    pub id: CartSessionId,
    /// Contents with server-reported totals.
    pub snapshot: CartSnapshot,
}

/// The response envelope every mutation returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEnvelope {
    /// Whether the server applied the mutation.
    pub success: bool,
    /// Resulting cart, when the server sent one.
    pub cart: Option<RemoteCart>,
    /// Business-rule messages, most relevant first.
    pub errors: Vec<String>,
}

impl MutationEnvelope {
    /// A successful envelope carrying `cart`.
    #[must_use]
    pub const fn ok(cart: RemoteCart) -> Self {
        Self {
            success: true,
            cart: Some(cart),
            errors: Vec::new(),
        }
    }

    /// A rejected envelope with the given messages.
    #[must_use]
    pub const fn rejected(errors: Vec<String>) -> Self {
        Self {
            success: false,
            cart: None,
            errors,
        }
    }
}

/// The remote cart service.
///
/// `session` is the ambient cart token sent as request context; `None` is
/// only meaningful for the first add.
pub trait CartService: Send + Sync {
    /// Add one unit of a configuration.
    fn add_item(
        &self,
        session: Option<&CartSessionId>,
        input: AddLineInput,
    ) -> impl Future<Output = Result<MutationEnvelope, ServiceError>> + Send;

    /// Change a line's quantity.
    fn update_item(
        &self,
        session: Option<&CartSessionId>,
        input: UpdateLineInput,
    ) -> impl Future<Output = Result<MutationEnvelope, ServiceError>> + Send;

    /// Remove a line.
    fn remove_item(
        &self,
        session: Option<&CartSessionId>,
        input: RemoveLineInput,
    ) -> impl Future<Output = Result<MutationEnvelope, ServiceError>> + Send;

    /// Remove every line.
    fn clear(
        &self,
        session: Option<&CartSessionId>,
    ) -> impl Future<Output = Result<MutationEnvelope, ServiceError>> + Send;

    /// Read the cart filed under `session`. `Ok(None)` if the server no
    /// longer knows it.
    fn fetch(
        &self,
        session: &CartSessionId,
    ) -> impl Future<Output = Result<Option<RemoteCart>, ServiceError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_formatting() {
        let err = ServiceError::GraphQL(vec![
            GraphQLError {
                message: "Field not found".to_string(),
                path: vec![],
            },
            GraphQLError {
                message: "Invalid ID".to_string(),
                path: vec!["addCartItem".to_string()],
            },
        ]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field not found; Invalid ID path: addCartItem"
        );
    }

    #[test]
    fn test_graphql_error_no_details() {
        let err = ServiceError::GraphQL(vec![GraphQLError {
            message: String::new(),
            path: vec![],
        }]);
        assert_eq!(err.to_string(), "GraphQL errors: [error 1]: (no details)");
        assert_eq!(
            ServiceError::GraphQL(vec![]).to_string(),
            "GraphQL errors: (no error details provided)"
        );
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ServiceError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }

    #[test]
    fn test_add_input_serializes_without_labels() {
        let option = SelectedOption::new("color", "red").with_label("Cherry");
        let input = AddLineInput {
            product_id: "P1".to_string(),
            sku: "P1-RED".to_string(),
            quantity: 1,
            selected_options: vec![OptionInput::from(&option)],
        };
        let json = serde_json::to_value(&input).unwrap_or_default();
        assert_eq!(json["selectedOptions"][0]["attributeCode"], "color");
        assert!(json["selectedOptions"][0].get("label").is_none());
    }
}
