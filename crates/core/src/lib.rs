//! Souk Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront and its tests:
//! roles, entity ids, entity statuses, validated inputs (email, OTP),
//! prices and pagination.
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. The marketplace data itself lives in the external services; these
//! types describe the shapes the storefront exchanges with them.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, roles, statuses, email, OTP, price and pages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
