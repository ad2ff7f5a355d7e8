//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;
use std::str::FromStr;

use rust_decimal::Decimal;
use souk_core::Price;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a decimal amount as rupees, e.g. `₹1299.00`.
///
/// Usage in templates: `{{ product.price|price }}`
#[askama::filter_fn]
pub fn price(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_price(&value.to_string()))
}

/// Calendar date part of a timestamp.
///
/// Usage in templates: `{{ order_created|date }}`
#[askama::filter_fn]
pub fn date(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let text = value.to_string();
    Ok(text.get(..10).unwrap_or(&text).to_string())
}

fn format_price(raw: &str) -> String {
    Decimal::from_str(raw).map_or_else(
        |_| raw.to_string(),
        |amount| Price::inr(amount).display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("1299"), "₹1299.00");
        assert_eq!(format_price("0.005"), "₹0.01");
        assert_eq!(format_price("n/a"), "n/a");
    }
}
