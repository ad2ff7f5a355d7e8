//! Domain models for the storefront.

pub mod session;
pub mod toast;

pub use session::{SessionData, keys as session_keys};
pub use toast::{HxTrigger, Toast, ToastLevel};
