//! Data shared by every full page: the signed-in viewer, the pending flash
//! toast and pagination links.

use tower_sessions::Session;
use url::form_urlencoded;

use souk_core::{Page, Role, UserId};

use crate::error::AppError;
use crate::models::toast::take_flash;
use crate::models::{SessionData, Toast};

/// Stylesheet path, content-hashed when the build found `main.css`.
#[must_use]
pub fn stylesheet_href() -> String {
    let hash = env!("CSS_HASH");
    if hash.is_empty() {
        "/static/css/main.css".to_string()
    } else {
        format!("/static/css/derived/main.{hash}.css")
    }
}

/// The signed-in account as shown in the header.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub name: String,
    pub role: Role,
}

impl Viewer {
    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.role == Role::Customer
    }

    #[must_use]
    pub fn is_vendor(&self) -> bool {
        self.role == Role::Vendor
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[must_use]
    pub const fn home(&self) -> &'static str {
        self.role.home_path()
    }
}

/// Base layout fields.
#[derive(Debug, Clone)]
pub struct Layout {
    pub viewer: Option<Viewer>,
    pub flash: Option<Toast>,
    pub stylesheet: String,
}

impl Layout {
    /// Layout for a page render. Consumes the pending flash toast.
    pub async fn new(session: &Session, data: Option<&SessionData>) -> Self {
        Self {
            viewer: data.map(|d| Viewer {
                name: d.display_name.clone(),
                role: d.role,
            }),
            flash: take_flash(session).await,
            stylesheet: stylesheet_href(),
        }
    }

    /// Layout for a signed-out page that leaves the session flash in place.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            viewer: None,
            flash: None,
            stylesheet: stylesheet_href(),
        }
    }

    /// Layout with an explicit toast instead of the session flash.
    pub async fn with_toast(session: &Session, data: Option<&SessionData>, toast: Toast) -> Self {
        let mut layout = Self::new(session, data).await;
        layout.flash = Some(toast);
        layout
    }
}

/// Previous/next links under a paginated list.
#[derive(Debug, Clone, Default)]
pub struct PageNav {
    pub page: u32,
    pub total_pages: u32,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

impl PageNav {
    /// Links for `page`, keeping the other query parameters in `params`.
    /// Empty parameter values are dropped.
    #[must_use]
    pub fn new<T>(page: &Page<T>, path: &str, params: &[(&str, &str)]) -> Self {
        let href = |number: u32| {
            let mut query = form_urlencoded::Serializer::new(String::new());
            for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
                query.append_pair(key, value);
            }
            query.append_pair("page", &number.to_string());
            format!("{path}?{}", query.finish())
        };

        Self {
            page: page.page,
            total_pages: page.total_pages(),
            prev_href: page.has_prev().then(|| href(page.page - 1)),
            next_href: page.has_next().then(|| href(page.page + 1)),
        }
    }

    /// Whether there is more than one page.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.prev_href.is_some() || self.next_href.is_some()
    }
}

/// The account id a service call needs.
///
/// A session without one cannot address per-user resources; the browser is
/// signed out and asked to log in again.
///
/// # Errors
///
/// Returns `AppError::SessionExpired` if the session has no account id.
pub fn user_id(data: &SessionData) -> Result<&UserId, AppError> {
    data.user_id.as_ref().ok_or_else(|| {
        tracing::warn!("Session has no account id");
        AppError::SessionExpired
    })
}

#[cfg(test)]
mod tests {
    use souk_core::PageRequest;

    use super::*;

    #[test]
    fn test_page_nav_keeps_filters() {
        let all: Vec<u32> = (0..45).collect();
        let page = Page::from_slice(&all, PageRequest::new(2, 20));
        let nav = PageNav::new(&page, "/products", &[("category", "c1"), ("q", "")]);

        assert_eq!(nav.total_pages, 3);
        assert_eq!(
            nav.prev_href.as_deref(),
            Some("/products?category=c1&page=1")
        );
        assert_eq!(
            nav.next_href.as_deref(),
            Some("/products?category=c1&page=3")
        );
        assert!(nav.is_visible());
    }

    #[test]
    fn test_single_page_has_no_links() {
        let page = Page::from_slice(&[1, 2, 3], PageRequest::default());
        let nav = PageNav::new(&page, "/stores", &[]);
        assert!(!nav.is_visible());
    }
}
