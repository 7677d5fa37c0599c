//! Conversions from GraphQL response shapes to cart domain types.

use cartkeeper_core::{
    CartLineItem, CartSessionId, CartSnapshot, CurrencyCode, Price, SelectedOption,
    compute_variant_id,
};

use super::queries::{CartFields, CartItemFields, CartMutationFields, SelectedOptionFields};
use super::{MutationEnvelope, RemoteCart};

pub fn convert_cart(cart: CartFields) -> RemoteCart {
    let items = cart.items.into_iter().filter_map(convert_item).collect();
    RemoteCart {
        id: CartSessionId::new(cart.id),
        snapshot: CartSnapshot::authoritative(
            items,
            Price::new(cart.total_value, CurrencyCode::default()),
            cart.total_display,
            cart.is_empty,
        ),
    }
}

/// Lines with a non-positive quantity are dropped: they are never a valid
/// cart state. Quantities beyond `u32::MAX` are clamped.
fn convert_item(item: CartItemFields) -> Option<CartLineItem> {
    if item.quantity <= 0 {
        return None;
    }
    let quantity = u32::try_from(item.quantity).unwrap_or(u32::MAX);
    let selected_options: Vec<SelectedOption> = item
        .selected_options
        .into_iter()
        .map(convert_option)
        .collect();
    let variant_id = compute_variant_id(&item.product_id, &selected_options);

    Some(CartLineItem {
        id: item.id,
        product_id: item.product_id,
        sku: item.sku,
        name: item.name,
        quantity,
        price_value: item.price_value,
        price_display: item.price_display,
        total_value: item.total_value,
        total_display: item.total_display,
        selected_options,
        variant_id,
        image_url: item.image_url,
    })
}

fn convert_option(option: SelectedOptionFields) -> SelectedOption {
    let label = option.label.unwrap_or_else(|| option.value.clone());
    SelectedOption::new(option.attribute_code, option.value).with_label(label)
}

pub fn convert_envelope(payload: Option<CartMutationFields>) -> MutationEnvelope {
    match payload {
        Some(payload) => MutationEnvelope {
            success: payload.success,
            cart: payload.cart.map(convert_cart),
            errors: payload.errors.unwrap_or_default(),
        },
        None => MutationEnvelope::rejected(Vec::new()),
    }
}
