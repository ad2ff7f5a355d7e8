//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::{instrument, warn};

use souk_core::{Page, PageRequest, Role};

use crate::api::ProductFilter;
use crate::api::types::{Category, Product};
use crate::filters;
use crate::middleware::OptionalSession;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Products shown in the "new arrivals" grid.
const FEATURED_COUNT: u32 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub categories: Vec<Category>,
    pub featured: Vec<Product>,
    pub recommended: Vec<Product>,
}

/// Display the home page.
///
/// Categories, the newest products and, for a signed-in customer,
/// personalised recommendations are fetched concurrently. Each section
/// falls back to empty on failure.
#[instrument(skip(state, session, viewer))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    OptionalSession(viewer): OptionalSession,
) -> impl IntoResponse {
    let api = state.api();
    let products = api.products();
    let recommendations = api.recommendations();
    let filter = ProductFilter::default();

    let customer = viewer
        .as_ref()
        .filter(|v| v.role == Role::Customer)
        .and_then(|v| v.user_id.as_ref().map(|id| (id, &v.access_token)));

    let (categories, featured, recommended) = tokio::join!(
        products.categories(),
        products.list(&filter, PageRequest::new(1, FEATURED_COUNT)),
        async {
            match customer {
                Some((user_id, token)) => recommendations.for_user(token, user_id).await,
                None => Ok(Vec::new()),
            }
        },
    );

    let categories = categories.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load categories");
        Vec::new()
    });
    let featured = featured.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load featured products");
        Page::empty(PageRequest::default())
    });
    let recommended = recommended.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load recommendations");
        Vec::new()
    });

    HomeTemplate {
        layout: Layout::new(&session, viewer.as_ref()).await,
        categories,
        featured: featured.items,
        recommended,
    }
}
