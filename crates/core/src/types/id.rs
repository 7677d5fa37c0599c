//! Newtype IDs for opaque string identifiers.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing a cart session token with a visitor or line id.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use cartkeeper_core::define_id;
/// define_id!(WishlistId);
/// define_id!(ListingId);
///
/// let wishlist = WishlistId::new("w-1");
/// let listing = ListingId::new("w-1");
///
/// // These are different types, so this won't compile:
/// // let _: WishlistId = listing;
/// # assert_eq!(wishlist.as_str(), listing.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Opaque token naming a server-owned cart. Created and rotated by the server.
define_id!(CartSessionId);

// One browser visitor of the storefront; scopes durable storage.
define_id!(VisitorId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_as_str() {
        let id = CartSessionId::new("cart-1");
        assert_eq!(id.as_str(), "cart-1");
        assert_eq!(id.to_string(), "cart-1");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = VisitorId::from("v-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""v-42""#);

        let back: VisitorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
