//! Type-safe price representation using decimal arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A rupee price, the marketplace's trading currency.
    #[must_use]
    pub const fn inr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::INR)
    }

    /// Format for display with two decimal places, e.g. `₹1299.00`.
    #[must_use]
    pub fn display(&self) -> String {
        format!(
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        )
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }
}

/// ISO 4217 currency codes accepted by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_display_rounds_to_two_places() {
        let price = Price::new(Decimal::from_str("499.5").unwrap(), CurrencyCode::INR);
        assert_eq!(price.display(), "₹499.50");

        let price = Price::new(Decimal::from_str("12.345").unwrap(), CurrencyCode::USD);
        assert_eq!(price.display(), "$12.35");
    }

    #[test]
    fn test_times() {
        let price = Price::new(Decimal::from_str("19.99").unwrap(), CurrencyCode::GBP);
        assert_eq!(price.times(3).display(), "£59.97");
    }

    #[test]
    fn test_currency_defaults_when_missing() {
        let price: Price = serde_json::from_str(r#"{"amount":"10"}"#).unwrap();
        assert_eq!(price.currency_code, CurrencyCode::INR);
    }
}
