//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `token` - Access token claim decoding (display only, unverified)
//! - `cart_bootstrap` - Find or create the customer's cart
//! - `approval` - Approval boards for admin and vendor tables
//! - `notifications` - Per-session notification feeds
//! - `onboarding` - Vendor onboarding wizard
//! - `validation` - Form validation

pub mod approval;
pub mod cart_bootstrap;
pub mod notifications;
pub mod onboarding;
pub mod token;
pub mod validation;
