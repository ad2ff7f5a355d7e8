//! Core types for the Souk marketplace.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod otp;
pub mod page;
pub mod price;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use otp::{Otp, OtpError};
pub use page::{Page, PageRequest};
pub use price::{CurrencyCode, Price};
pub use role::{Role, RoleParseError, RoleSet};
pub use status::*;
