//! Status enums for marketplace entities.
//!
//! Each status enum lists its variants in `ALL` in the order the admin and
//! vendor tables show them as tabs.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} status: {value}")]
pub struct StatusParseError {
    /// Which status family was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Common behaviour of the status enums used by approval tables.
pub trait EntityStatus:
    Copy + Eq + core::hash::Hash + fmt::Debug + fmt::Display + FromStr + 'static
{
    /// All statuses in tab order.
    const ALL: &'static [Self];

    /// Wire representation.
    fn as_str(self) -> &'static str;

    /// Human-readable label.
    fn label(self) -> &'static str;
}

macro_rules! status_impls {
    ($ty:ident, $kind:literal, [$($variant:ident => $wire:literal, $label:literal),+ $(,)?]) => {
        impl $ty {
            /// All statuses in tab order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Human-readable label.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl EntityStatus for $ty {
            const ALL: &'static [Self] = $ty::ALL;

            fn as_str(self) -> &'static str {
                $ty::as_str(self)
            }

            fn label(self) -> &'static str {
                $ty::label(self)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = StatusParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(StatusParseError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Moderation status of a product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

status_impls!(ProductStatus, "product", [
    Pending => "pending", "Pending",
    Approved => "approved", "Approved",
    Rejected => "rejected", "Rejected",
]);

/// Moderation status of a vendor store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Suspended,
}

status_impls!(StoreStatus, "store", [
    Pending => "pending", "Pending",
    Approved => "approved", "Approved",
    Rejected => "rejected", "Rejected",
    Suspended => "suspended", "Suspended",
]);

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

status_impls!(OrderStatus, "order", [
    Pending => "pending", "Pending",
    Processing => "processing", "Processing",
    Shipped => "shipped", "Shipped",
    Delivered => "delivered", "Delivered",
    Cancelled => "cancelled", "Cancelled",
]);

impl OrderStatus {
    /// Statuses an order moves through when nothing goes wrong.
    pub const TIMELINE: [Self; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
    ];

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Statuses a seller or operator may move the order to from here.
    #[must_use]
    pub const fn next_allowed(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered],
            Self::Delivered | Self::Cancelled => &[],
        }
    }

    /// Position on the happy-path timeline, `None` when cancelled.
    #[must_use]
    pub fn timeline_index(self) -> Option<usize> {
        Self::TIMELINE.iter().position(|s| *s == self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_str() {
        for status in StoreStatus::ALL {
            assert_eq!(status.as_str().parse::<StoreStatus>().unwrap(), *status);
        }
        assert_eq!("APPROVED".parse::<ProductStatus>().unwrap(), ProductStatus::Approved);
    }

    #[test]
    fn test_status_parse_error_names_kind() {
        let err = "lost".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid order status: lost");
    }

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"processing\""
        );
        let status: ProductStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(status, ProductStatus::Rejected);
    }

    #[test]
    fn test_order_transitions() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Delivered.next_allowed().is_empty());
        assert_eq!(
            OrderStatus::Pending.next_allowed(),
            &[OrderStatus::Processing, OrderStatus::Cancelled]
        );
        assert_eq!(OrderStatus::Shipped.timeline_index(), Some(2));
        assert_eq!(OrderStatus::Cancelled.timeline_index(), None);
    }

    #[test]
    fn test_trait_all_matches_inherent_all() {
        assert_eq!(<ProductStatus as EntityStatus>::ALL, ProductStatus::ALL);
        assert_eq!(<OrderStatus as EntityStatus>::ALL.len(), 5);
    }
}
