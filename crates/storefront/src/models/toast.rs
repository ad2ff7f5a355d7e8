//! Toast notifications shown to the user.
//!
//! HTMX requests receive toasts in an `HX-Trigger` header; full page flows
//! store one in the session as a flash rendered by the next page.

use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tower_sessions::Session;

use super::session::keys;

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl ToastLevel {
    /// CSS modifier class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A short message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, message)
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Info, message)
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Warning, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Error, message)
    }

    fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Builder for the `HX-Trigger` response header.
#[derive(Debug, Default)]
pub struct HxTrigger {
    events: Map<String, Value>,
}

impl HxTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire a client-side event with no detail.
    #[must_use]
    pub fn event(mut self, name: &str) -> Self {
        self.events.insert(name.to_string(), Value::Null);
        self
    }

    /// Show a toast.
    #[must_use]
    pub fn toast(mut self, toast: &Toast) -> Self {
        self.events.insert(
            "toast".to_string(),
            json!({ "level": toast.level, "message": toast.message }),
        );
        self
    }

    /// Header value, `None` when no event was added.
    #[must_use]
    pub fn header_value(&self) -> Option<HeaderValue> {
        if self.events.is_empty() {
            return None;
        }
        HeaderValue::from_str(&Value::Object(self.events.clone()).to_string()).ok()
    }

    /// Headers to append to a response.
    #[must_use]
    pub fn into_headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.header_value() {
            headers.insert("HX-Trigger", value);
        }
        headers
    }
}

/// Store a toast for the next full page render.
pub async fn push_flash(session: &Session, toast: &Toast) {
    if let Err(e) = session.insert(keys::FLASH, toast).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Take the pending flash toast, if any.
pub async fn take_flash(session: &Session) -> Option<Toast> {
    session.remove::<Toast>(keys::FLASH).await.ok().flatten()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hx_trigger_with_event_and_toast() {
        let value = HxTrigger::new()
            .event("cart-updated")
            .toast(&Toast::error("Could not update quantity"))
            .header_value()
            .unwrap();
        let parsed: Value = serde_json::from_str(value.to_str().unwrap()).unwrap();
        assert!(parsed.get("cart-updated").is_some());
        assert_eq!(parsed["toast"]["level"], "error");
        assert_eq!(parsed["toast"]["message"], "Could not update quantity");
    }

    #[test]
    fn test_empty_trigger_has_no_header() {
        assert!(HxTrigger::new().header_value().is_none());
        assert!(HxTrigger::new().into_headers().is_empty());
    }
}
