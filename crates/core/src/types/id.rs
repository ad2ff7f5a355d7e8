//! Newtype IDs for type-safe entity references.
//!
//! The marketplace services hand out opaque string identifiers. Use the
//! `define_id!` macro to wrap them so a product id can never be passed where
//! a store id is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `Display`, `AsRef<str>`, `From<String>` and `From<&str>`
///
/// # Example
///
/// ```rust
/// # use souk_core::define_id;
/// define_id!(InvoiceId);
/// define_id!(ShipmentId);
///
/// let invoice = InvoiceId::new("inv_42");
/// let shipment = ShipmentId::new("shp_42");
///
/// // These are different types, so this won't compile:
/// // let _: InvoiceId = shipment;
/// assert_eq!(invoice.as_str(), "inv_42");
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
            PartialOrd,
            Ord,
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

            /// Borrow the underlying identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
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

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(StoreId);
define_id!(OrderId);
define_id!(CartId);
define_id!(CartItemId);
define_id!(CategoryId);
define_id!(SubcategoryId);
define_id!(NotificationId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = ProductId::new("64f1c0ffee");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"64f1c0ffee\"");

        let parsed: StoreId = serde_json::from_str("\"store-9\"").unwrap();
        assert_eq!(parsed.as_str(), "store-9");
    }

    #[test]
    fn test_display_matches_inner() {
        let id = CartId::from("cart_1");
        assert_eq!(id.to_string(), "cart_1");
        assert_eq!(id.into_inner(), "cart_1");
    }
}
