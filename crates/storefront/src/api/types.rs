//! Request and response shapes exchanged with the marketplace services.
//!
//! The services speak camelCase JSON and some expose MongoDB-style `_id`
//! fields; aliases below accept both spellings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souk_core::{
    CartId, CartItemId, CategoryId, NotificationId, OrderId, OrderStatus, Page, PageRequest,
    ProductId, ProductStatus, Role, StoreId, StoreStatus, SubcategoryId, UserId,
};

// =============================================================================
// List envelopes
// =============================================================================

/// A list response: either a bare JSON array or a paging envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped(Wrapped<T>),
}

/// Paging envelope used by the services that paginate server-side.
#[derive(Debug, Deserialize)]
pub struct Wrapped<T> {
    #[serde(
        alias = "items",
        alias = "results",
        alias = "products",
        alias = "stores",
        alias = "orders",
        alias = "users",
        alias = "categories",
        alias = "subcategories"
    )]
    pub data: Vec<T>,
    #[serde(default, alias = "totalCount", alias = "count")]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, alias = "perPage", alias = "per_page", alias = "pageSize")]
    pub limit: Option<u32>,
}

impl<T> ListBody<T> {
    /// Convert into a [`Page`].
    ///
    /// A bare array is treated as the complete result set and paginated
    /// locally; an envelope is trusted as the requested page.
    pub fn into_page(self, request: PageRequest) -> Page<T> {
        match self {
            Self::Bare(all) => {
                let total = all.len() as u64;
                let items = all
                    .into_iter()
                    .skip(request.offset())
                    .take(request.per_page as usize)
                    .collect();
                Page {
                    items,
                    page: request.page,
                    per_page: request.per_page,
                    total,
                }
            }
            Self::Wrapped(w) => {
                let total = w.total.unwrap_or(w.data.len() as u64);
                Page {
                    items: w.data,
                    page: w.page.unwrap_or(request.page).max(1),
                    per_page: w.limit.unwrap_or(request.per_page).max(1),
                    total,
                }
            }
        }
    }

    /// Every item, ignoring paging information.
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(all) => all,
            Self::Wrapped(w) => w.data,
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "access_token", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: Role,
}

/// Why an OTP is being issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Signup,
    PasswordReset,
}

#[derive(Debug, Serialize)]
pub struct SendOtpRequest<'a> {
    pub email: &'a str,
    pub purpose: OtpPurpose,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpResponse {
    #[serde(default = "default_true")]
    pub verified: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
    pub new_password: &'a str,
}

/// The signed-in account's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Registered accounts per role.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UserCounts {
    #[serde(default)]
    pub customers: u64,
    #[serde(default)]
    pub vendors: u64,
    #[serde(default)]
    pub admins: u64,
}

impl UserCounts {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.customers + self.vendors + self.admins
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Carts
// =============================================================================

/// Answer of the "get cart for user" endpoint; the id is absent when the
/// user has no cart yet.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLookup {
    #[serde(default, alias = "_id", alias = "id", alias = "cart_id")]
    pub cart_id: Option<CartId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCartRequest<'a> {
    pub user_id: &'a UserId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(alias = "_id")]
    pub id: CartId,
    #[serde(default)]
    pub items: Vec<CartLine>,
}

impl Cart {
    /// Sum of `unit_price * quantity` over every line.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum()
    }

    /// Total units in the cart.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(alias = "_id")]
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartLine<'a> {
    pub product_id: &'a ProductId,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct UpdateCartLine {
    pub quantity: u32,
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub subcategory_id: Option<SubcategoryId>,
    #[serde(default)]
    pub store_id: Option<StoreId>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i64,
    pub category_id: CategoryId,
    pub subcategory_id: Option<SubcategoryId>,
    pub images: Vec<String>,
    pub store_id: StoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(alias = "_id")]
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    #[serde(alias = "_id")]
    pub id: SubcategoryId,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

/// Body of every "update status" call.
#[derive(Debug, Serialize)]
pub struct StatusUpdate<S> {
    pub status: S,
}

// =============================================================================
// Stores
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    #[serde(alias = "_id")]
    pub id: StoreId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub status: StoreStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Vendor onboarding submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreApplication {
    pub owner_id: UserId,
    pub business_name: String,
    pub business_type: String,
    pub tax_id: String,
    pub contact_phone: String,
    pub store_name: String,
    pub description: String,
    pub category_id: CategoryId,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub account_holder: String,
    pub account_number: String,
    pub bank_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesDashboard {
    #[serde(default)]
    pub total_revenue: Decimal,
    #[serde(default)]
    pub total_orders: u64,
    #[serde(default)]
    pub pending_orders: u64,
    #[serde(default)]
    pub products_listed: u64,
    #[serde(default)]
    pub monthly: Vec<MonthlySales>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlySales {
    pub month: String,
    pub revenue: Decimal,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub store_id: Option<StoreId>,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    pub total: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
}

// =============================================================================
// Wishlist
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWishlistItem<'a> {
    pub user_id: &'a UserId,
    pub product_id: &'a ProductId,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: NotificationId,
    #[serde(default)]
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_list_is_paginated_locally() {
        let body: ListBody<u32> = serde_json::from_str("[1,2,3,4,5]").unwrap();
        let page = body.into_page(PageRequest::new(2, 2));
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_wrapped_list_is_trusted() {
        let body: ListBody<u32> =
            serde_json::from_str(r#"{"products":[7,8],"total":42,"page":3,"limit":2}"#).unwrap();
        let page = body.into_page(PageRequest::new(1, 20));
        assert_eq!(page.items, vec![7, 8]);
        assert_eq!(page.page, 3);
        assert_eq!(page.per_page, 2);
        assert_eq!(page.total, 42);
    }

    #[test]
    fn test_login_response_accepts_both_spellings() {
        let camel: LoginResponse = serde_json::from_str(
            r#"{"accessToken":"a.b.c","refreshToken":"r","role":"vendor"}"#,
        )
        .unwrap();
        assert_eq!(camel.access_token, "a.b.c");
        assert_eq!(camel.role, Some(Role::Vendor));

        let snake: LoginResponse =
            serde_json::from_str(r#"{"access_token":"x.y.z"}"#).unwrap();
        assert_eq!(snake.access_token, "x.y.z");
        assert!(snake.refresh_token.is_none());
    }

    #[test]
    fn test_cart_lookup_variants() {
        let found: CartLookup = serde_json::from_str(r#"{"_id":"c1"}"#).unwrap();
        assert_eq!(found.cart_id.unwrap().as_str(), "c1");

        let missing: CartLookup = serde_json::from_str("{}").unwrap();
        assert!(missing.cart_id.is_none());

        let null: CartLookup = serde_json::from_str(r#"{"cartId":null}"#).unwrap();
        assert!(null.cart_id.is_none());
    }

    #[test]
    fn test_cart_totals() {
        let cart: Cart = serde_json::from_str(
            r#"{"id":"c1","items":[
                {"id":"l1","productId":"p1","name":"Mug","unitPrice":"250.00","quantity":2},
                {"id":"l2","productId":"p2","name":"Tea","price":99.5,"quantity":1}
            ]}"#,
        )
        .unwrap();
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal().to_string(), "599.50");
    }

    #[test]
    fn test_product_defaults() {
        let product: Product =
            serde_json::from_str(r#"{"_id":"p9","name":"Kurta","price":"799"}"#).unwrap();
        assert_eq!(product.id.as_str(), "p9");
        assert_eq!(product.status, ProductStatus::Pending);
        assert!(product.images.is_empty());
    }
}
