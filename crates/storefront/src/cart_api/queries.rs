//! GraphQL operation definitions for the remote cart service.
//!
//! All operations live in one document (`graphql/cart.graphql`); each request
//! selects its operation by name. Variables and response shapes are typed by
//! hand so no schema dump has to ship with the crate.

use graphql_client::{GraphQLQuery, QueryBody};
use rust_decimal::Decimal;
use serde::Deserialize;

const DOCUMENT: &str = include_str!("../../graphql/cart.graphql");

/// Implements `GraphQLQuery` for an operation in [`DOCUMENT`].
macro_rules! cart_operation {
    ($name:ident, $module:ident) => {
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $module::Variables;
            type ResponseData = $module::ResponseData;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: DOCUMENT,
                    operation_name: stringify!($name),
                }
            }
        }
    };
}

cart_operation!(AddCartItem, add_cart_item);
cart_operation!(UpdateCartItem, update_cart_item);
cart_operation!(RemoveCartItem, remove_cart_item);
cart_operation!(ClearCart, clear_cart);
cart_operation!(GetCart, get_cart);

// =============================================================================
// Shared response shapes (the CartFields fragment)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartFields {
    pub id: String,
    pub is_empty: bool,
    pub total_value: Decimal,
    pub total_display: String,
    #[serde(default)]
    pub items: Vec<CartItemFields>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemFields {
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub price_value: Decimal,
    pub price_display: String,
    pub total_value: Option<Decimal>,
    pub total_display: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<SelectedOptionFields>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOptionFields {
    pub attribute_code: String,
    pub value: String,
    pub label: Option<String>,
}

/// `{ success, errors, cart }` as returned by every mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct CartMutationFields {
    pub success: bool,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    pub cart: Option<CartFields>,
}

// =============================================================================
// Per-operation variables and response data
// =============================================================================

pub mod add_cart_item {
    use serde::{Deserialize, Serialize};

    use crate::cart_api::AddLineInput;

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub input: AddLineInput,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub add_cart_item: Option<super::CartMutationFields>,
    }
}

pub mod update_cart_item {
    use serde::{Deserialize, Serialize};

    use crate::cart_api::UpdateLineInput;

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub input: UpdateLineInput,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub update_cart_item: Option<super::CartMutationFields>,
    }
}

pub mod remove_cart_item {
    use serde::{Deserialize, Serialize};

    use crate::cart_api::RemoveLineInput;

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub input: RemoveLineInput,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub remove_cart_item: Option<super::CartMutationFields>,
    }
}

pub mod clear_cart {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize)]
    pub struct Variables {}

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub clear_cart: Option<super::CartMutationFields>,
    }
}

pub mod get_cart {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize)]
    pub struct Variables {}

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub cart: Option<super::CartFields>,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_selects_operation() {
        let body = ClearCart::build_query(clear_cart::Variables {});
        assert_eq!(body.operation_name, "ClearCart");
        assert!(body.query.contains("mutation ClearCart"));
        assert!(body.query.contains("fragment CartFields"));
    }

    #[test]
    fn test_mutation_response_parses_numbers_and_strings() {
        let json = r#"{
            "addCartItem": {
                "success": true,
                "errors": null,
                "cart": {
                    "id": "cart-2",
                    "isEmpty": false,
                    "totalValue": 24.5,
                    "totalDisplay": "$24.50",
                    "items": [{
                        "id": "line-1",
                        "productId": "P1",
                        "sku": "P1-RED",
                        "name": "Tee",
                        "quantity": 2,
                        "priceValue": "12.25",
                        "priceDisplay": "$12.25",
                        "totalValue": 24.5,
                        "totalDisplay": "$24.50",
                        "imageUrl": null,
                        "selectedOptions": [{"attributeCode": "color", "value": "red", "label": "Red"}]
                    }]
                }
            }
        }"#;

        let data: add_cart_item::ResponseData = serde_json::from_str(json).unwrap();
        let payload = data.add_cart_item.unwrap();
        let cart = payload.cart.unwrap();
        assert!(payload.success);
        assert_eq!(cart.id, "cart-2");
        assert_eq!(cart.items[0].price_value, Decimal::new(1225, 2));
        assert_eq!(cart.items[0].selected_options[0].attribute_code, "color");
    }
}
