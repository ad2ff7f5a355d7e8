//! Form validation run before any request reaches a service.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use souk_core::{CategoryId, Email, Otp, OtpError, Role, StoreId, SubcategoryId};

use crate::api::types::NewProduct;

/// Toast shown when an OTP is incomplete or malformed.
pub const OTP_PROMPT: &str = "Please enter the 6-digit code";

/// Minimum password length for new accounts.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Largest quantity of one product in the cart.
pub const MAX_CART_QUANTITY: u32 = 99;

/// A message attached to a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found in a submitted form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first message for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// The first message overall, for toasts.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(value)` when no error was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when any error was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    // =========================================================================
    // Field checks
    // =========================================================================

    /// Record an error unless `value` has non-whitespace content.
    pub fn required(&mut self, field: &'static str, label: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.push(field, format!("{label} is required"));
            return false;
        }
        true
    }

    /// Parse an email address.
    pub fn email(&mut self, field: &'static str, value: &str) -> Option<Email> {
        match Email::parse(value) {
            Ok(email) => Some(email),
            Err(e) => {
                self.push(field, format!("Enter a valid email address ({e})"));
                None
            }
        }
    }

    /// Exactly `len` ASCII letters or digits.
    pub fn alphanumeric_exact(&mut self, field: &'static str, label: &str, value: &str, len: usize) {
        let value = value.trim();
        if value.len() != len || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            self.push(field, format!("{label} must be {len} letters or digits"));
        }
    }

    /// Between `min` and `max` ASCII digits.
    pub fn digits_between(
        &mut self,
        field: &'static str,
        label: &str,
        value: &str,
        min: usize,
        max: usize,
    ) {
        let value = value.trim();
        let ok = (min..=max).contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit());
        if !ok {
            if min == max {
                self.push(field, format!("{label} must be {min} digits"));
            } else {
                self.push(field, format!("{label} must be {min} to {max} digits"));
            }
        }
    }

    /// Parse a value with `FromStr`.
    pub fn parse<T: FromStr>(&mut self, field: &'static str, label: &str, value: &str) -> Option<T> {
        match value.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.push(field, format!("{label} is not valid"));
                None
            }
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Check a one-time code. The error is the message to show.
///
/// # Errors
///
/// Returns [`OTP_PROMPT`] for incomplete or non-numeric input.
pub fn otp(input: &str) -> Result<Otp, &'static str> {
    Otp::parse(input).map_err(|e: OtpError| {
        tracing::debug!(reason = %e, "Rejected OTP entry");
        OTP_PROMPT
    })
}

/// A validated signup.
#[derive(Debug, Clone)]
pub struct Signup {
    pub name: String,
    pub email: Email,
    pub role: Role,
}

/// Validate the registration form.
///
/// # Errors
///
/// Returns every problem found.
pub fn registration(
    name: &str,
    email: &str,
    password: &str,
    confirm: &str,
    role: &str,
) -> Result<Signup, FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.required("name", "Name", name);
    let email = errors.email("email", email);
    password_rules(&mut errors, password, confirm);
    let role = match role.parse::<Role>() {
        Ok(role @ (Role::Customer | Role::Vendor)) => Some(role),
        _ => {
            errors.push("role", "Choose a customer or vendor account");
            None
        }
    };

    match (email, role) {
        (Some(email), Some(role)) if errors.is_empty() => Ok(Signup {
            name: name.trim().to_string(),
            email,
            role,
        }),
        _ => Err(errors),
    }
}

/// Password length and confirmation.
pub fn password_rules(errors: &mut FieldErrors, password: &str, confirm: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    if password != confirm {
        errors.push("confirm_password", "Passwords do not match");
    }
}

/// Raw product creation form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: String,
    pub category_id: String,
    pub subcategory_id: String,
    pub image_urls: String,
}

/// Validate a new listing for `store_id`.
///
/// # Errors
///
/// Returns every problem found.
pub fn new_product(input: &ProductInput, store_id: StoreId) -> Result<NewProduct, FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.required("name", "Name", &input.name);

    let price = errors.parse::<Decimal>("price", "Price", &input.price);
    if price.is_some_and(|p| p <= Decimal::ZERO) {
        errors.push("price", "Price must be greater than zero");
    }

    let stock = errors.parse::<i64>("stock", "Stock", &input.stock);
    if stock.is_some_and(|s| s < 0) {
        errors.push("stock", "Stock cannot be negative");
    }

    if input.category_id.trim().is_empty() {
        errors.push("category_id", "Choose a category");
    }

    let images = input
        .image_urls
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect();

    match (price, stock) {
        (Some(price), Some(stock)) if errors.is_empty() => Ok(NewProduct {
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            price,
            stock,
            category_id: CategoryId::new(input.category_id.trim()),
            subcategory_id: Some(input.subcategory_id.trim())
                .filter(|s| !s.is_empty())
                .map(SubcategoryId::new),
            images,
            store_id,
        }),
        _ => Err(errors),
    }
}

/// Check a cart quantity as typed into the form.
///
/// # Errors
///
/// Returns the message to show when the input is not a number or is out of
/// range.
pub fn cart_quantity(input: &str) -> Result<u32, String> {
    match input.trim().parse::<u32>() {
        Ok(quantity) if (1..=MAX_CART_QUANTITY).contains(&quantity) => Ok(quantity),
        _ => Err(format!("Quantity must be between 1 and {MAX_CART_QUANTITY}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_prompt() {
        assert_eq!(otp("01234").unwrap_err(), OTP_PROMPT);
        assert_eq!(otp("").unwrap_err(), OTP_PROMPT);
        assert_eq!(otp("12a456").unwrap_err(), OTP_PROMPT);
        assert_eq!(otp(" 012345 ").unwrap().as_str(), "012345");
    }

    #[test]
    fn test_registration_collects_every_error() {
        let errors = registration("", "not-an-email", "short", "other", "admin").unwrap_err();
        assert!(errors.get("name").is_some());
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());
        assert!(errors.get("confirm_password").is_some());
        assert!(errors.get("role").is_some());
    }

    #[test]
    fn test_registration_accepts_vendor() {
        let signup =
            registration(" Meera ", "meera@example.in", "longenough", "longenough", "vendor")
                .unwrap();
        assert_eq!(signup.name, "Meera");
        assert_eq!(signup.role, Role::Vendor);
    }

    #[test]
    fn test_new_product_rules() {
        let input = ProductInput {
            name: "Brass lamp".to_string(),
            price: "0".to_string(),
            stock: "-1".to_string(),
            ..ProductInput::default()
        };
        let errors = new_product(&input, StoreId::new("s1")).unwrap_err();
        assert_eq!(errors.get("price"), Some("Price must be greater than zero"));
        assert_eq!(errors.get("stock"), Some("Stock cannot be negative"));
        assert_eq!(errors.get("category_id"), Some("Choose a category"));

        let input = ProductInput {
            name: "Brass lamp".to_string(),
            price: "1499.00".to_string(),
            stock: "4".to_string(),
            category_id: "home".to_string(),
            image_urls: "https://img.example/a.jpg\n\n https://img.example/b.jpg".to_string(),
            ..ProductInput::default()
        };
        let product = new_product(&input, StoreId::new("s1")).unwrap();
        assert_eq!(product.images.len(), 2);
        assert!(product.subcategory_id.is_none());
    }

    #[test]
    fn test_field_checks() {
        let mut errors = FieldErrors::new();
        errors.alphanumeric_exact("gst", "GST number", "22AAAAA0000A1Z5", 15);
        errors.digits_between("account", "Account number", "123456789012", 9, 18);
        errors.digits_between("phone", "Phone", "98765 4321", 10, 10);
        assert_eq!(errors.iter().count(), 1);
        assert_eq!(errors.get("phone"), Some("Phone must be 10 digits"));
    }

    #[test]
    fn test_cart_quantity_bounds() {
        assert!(cart_quantity("0").is_err());
        assert_eq!(cart_quantity("1"), Ok(1));
        assert_eq!(cart_quantity(" 99 "), Ok(99));
        assert!(cart_quantity("100").is_err());
    }

    #[test]
    fn test_cart_quantity_rejects_non_numbers() {
        for input in ["", "  ", "two", "-1", "1.5"] {
            assert_eq!(
                cart_quantity(input),
                Err(format!("Quantity must be between 1 and {MAX_CART_QUANTITY}")),
                "{input:?}"
            );
        }
    }
}
