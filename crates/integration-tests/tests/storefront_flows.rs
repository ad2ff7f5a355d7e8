//! End-to-end flows against the fake marketplace services.

use reqwest::StatusCode;

use souk_integration_tests::{
    Account, FakeMarketplace, PASSWORD, Storefront, VALID_OTP, location,
};

async fn start() -> (FakeMarketplace, Storefront) {
    let marketplace = FakeMarketplace::spawn().await;
    let storefront = Storefront::spawn(&marketplace).await;
    (marketplace, storefront)
}

/// The `HX-Trigger` header, or an empty string.
fn hx_trigger(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("hx-trigger")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_each_role_lands_on_its_home() {
    for (account, home) in [
        (Account::Shopper, "/"),
        (Account::Vendor, "/vendor"),
        (Account::Admin, "/admin"),
    ] {
        let (_marketplace, storefront) = start().await;
        let response = storefront.login(account).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{account:?}");
        assert_eq!(location(&response), home, "{account:?}");
    }
}

#[tokio::test]
async fn test_customer_login_creates_missing_cart() {
    let (marketplace, storefront) = start().await;
    storefront.login(Account::Shopper).await;

    let lookup = format!("GET /carts/user/{}", Account::Shopper.user_id());
    assert!(marketplace.was_called(&lookup), "{:?}", marketplace.calls());
    assert!(marketplace.was_called("POST /carts"));

    let response = storefront.get_fragment("/cart/count").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(marketplace.was_called(&format!("GET /carts/{}", Account::Shopper.cart_id())));
}

#[tokio::test]
async fn test_vendor_login_skips_cart_bootstrap() {
    let (marketplace, storefront) = start().await;
    storefront.login(Account::Vendor).await;

    assert!(!marketplace.calls().iter().any(|c| c.starts_with("GET /carts")));
    assert!(!marketplace.was_called("POST /carts"));
}

#[tokio::test]
async fn test_roles_are_kept_to_their_pages() {
    let (_marketplace, storefront) = start().await;
    storefront.login(Account::Vendor).await;

    for path in ["/cart", "/wishlist", "/orders", "/admin", "/admin/users"] {
        let response = storefront.get(path).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
    }
    let response = storefront.get("/account").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_denied_page_makes_no_service_calls() {
    // The notification listener connects in the background; only page
    // traffic counts here.
    let page_calls = |m: &FakeMarketplace| {
        m.calls()
            .into_iter()
            .filter(|c| !c.contains("/notifications"))
            .count()
    };

    let (marketplace, storefront) = start().await;
    storefront.login(Account::Shopper).await;
    let before = page_calls(&marketplace);

    let response = storefront.get("/admin/users").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(page_calls(&marketplace), before);
}

#[tokio::test]
async fn test_vendor_without_store_is_sent_to_onboarding() {
    let (_marketplace, storefront) = start().await;
    storefront.login(Account::Vendor).await;

    let response = storefront.get("/vendor/products").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/vendor/onboarding");

    let response = storefront.get("/vendor/onboarding").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap_or_default();
    assert!(body.contains("/vendor/onboarding/business"));
}

#[tokio::test]
async fn test_wrong_password_rerenders_login() {
    let (_marketplace, storefront) = start().await;
    let response = storefront
        .post_form(
            "/auth/login",
            &[("email", Account::Shopper.email()), ("password", "nope")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap_or_default();
    assert!(body.contains("Invalid email or password"));

    let response = storefront.get("/orders").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_returns_to_next() {
    let (_marketplace, storefront) = start().await;
    let response = storefront
        .post_form(
            "/auth/login",
            &[
                ("email", Account::Shopper.email()),
                ("password", PASSWORD),
                ("next", "/orders"),
            ],
        )
        .await;
    assert_eq!(location(&response), "/orders");
}

#[tokio::test]
async fn test_offsite_next_is_ignored() {
    let (_marketplace, storefront) = start().await;
    let response = storefront
        .post_form(
            "/auth/login",
            &[
                ("email", Account::Shopper.email()),
                ("password", PASSWORD),
                ("next", "//evil.example/phish"),
            ],
        )
        .await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_rejected_token_signs_out() {
    let (marketplace, storefront) = start().await;
    storefront.login(Account::Shopper).await;
    marketplace.reject_tokens();

    let response = storefront.get("/orders").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?expired=1");

    let response = storefront.get("/account").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejected_token_on_fragment_redirects_whole_page() {
    let (marketplace, storefront) = start().await;
    storefront.login(Account::Shopper).await;
    marketplace.reject_tokens();

    let response = storefront.get_fragment("/cart/count").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get("hx-redirect")
            .and_then(|v| v.to_str().ok()),
        Some("/auth/login?expired=1")
    );
}

#[tokio::test]
async fn test_logout_clears_session() {
    let (_marketplace, storefront) = start().await;
    storefront.login(Account::Admin).await;
    assert_eq!(storefront.get("/admin/users").await.status(), StatusCode::OK);

    let response = storefront.post_form("/auth/logout", &[]).await;
    assert_eq!(location(&response), "/");
    assert_eq!(
        storefront.get("/admin/users").await.status(),
        StatusCode::UNAUTHORIZED
    );
}

async fn register(storefront: &Storefront) -> reqwest::Response {
    storefront
        .post_form(
            "/auth/register",
            &[
                ("name", "Asha"),
                ("email", "asha@souk.in"),
                ("password", "long-enough"),
                ("confirm_password", "long-enough"),
                ("role", "customer"),
            ],
        )
        .await
}

#[tokio::test]
async fn test_registration_continues_to_code_entry() {
    let (marketplace, storefront) = start().await;
    let response = register(&storefront).await;

    assert_eq!(location(&response), "/auth/verify");
    assert!(marketplace.was_called("POST /auth/register"));
    assert!(marketplace.was_called("POST /auth/otp/send"));

    let response = storefront.post_form("/auth/verify", &[("otp", VALID_OTP)]).await;
    assert_eq!(location(&response), "/auth/login");
}

#[tokio::test]
async fn test_short_code_is_stopped_before_the_service() {
    let (marketplace, storefront) = start().await;
    register(&storefront).await;

    let response = storefront.post_form("/auth/verify", &[("otp", "4291")]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap_or_default();
    assert!(body.contains("6-digit code"), "{body}");
    assert!(!marketplace.was_called("POST /auth/otp/verify"));
}

#[tokio::test]
async fn test_verify_without_signup_goes_to_register() {
    let (_marketplace, storefront) = start().await;
    let response = storefront.get("/auth/verify").await;
    assert_eq!(location(&response), "/auth/register");
}

#[tokio::test]
async fn test_second_login_replaces_the_first_account() {
    let (marketplace, storefront) = start().await;
    storefront.login(Account::Shopper).await;
    assert!(marketplace.wait_for_calls("GET /notifications/stream", 1).await);

    let response = storefront.login(Account::Buyer).await;
    assert_eq!(location(&response), "/");

    let lookup = format!("GET /carts/user/{}", Account::Buyer.user_id());
    assert!(marketplace.was_called(&lookup), "{:?}", marketplace.calls());
    assert!(
        marketplace.wait_for_calls("GET /notifications/stream", 2).await,
        "{:?}",
        marketplace.calls()
    );

    let shopper_cart = format!("GET /carts/{}", Account::Shopper.cart_id());
    let before = marketplace.count_calls(&shopper_cart);
    let response = storefront.get_fragment("/cart/count").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(marketplace.was_called(&format!("GET /carts/{}", Account::Buyer.cart_id())));
    assert_eq!(marketplace.count_calls(&shopper_cart), before);
}

const BOARD_FETCH: &str = "GET /products/status/";

async fn admin_on_product_board() -> (FakeMarketplace, Storefront) {
    let (marketplace, storefront) = start().await;
    storefront.login(Account::Admin).await;

    let response = storefront.get("/admin/products").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap_or_default();
    assert!(body.contains("Handloom saree"), "{body}");
    assert!(body.contains("Brass lamp"));
    // One fetch per status tab.
    assert_eq!(marketplace.count_calls(BOARD_FETCH), 3);

    (marketplace, storefront)
}

#[tokio::test]
async fn test_approval_moves_product_without_refetch() {
    let (marketplace, storefront) = admin_on_product_board().await;

    let response = storefront
        .post_fragment(
            "/admin/products/status",
            &[("id", "p-saree"), ("status", "approved"), ("tab", "pending"), ("page", "1")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(marketplace.was_called("PATCH /products/p-saree/status"));
    let trigger = hx_trigger(&response);
    assert!(trigger.contains("success"), "{trigger}");

    let fragment = response.text().await.unwrap_or_default();
    assert!(!fragment.contains("Handloom saree"), "{fragment}");
    assert!(fragment.contains("Brass lamp"));
    assert!(fragment.contains(r#"Pending <span class="count">1</span>"#), "{fragment}");
    assert!(fragment.contains(r#"Approved <span class="count">2</span>"#), "{fragment}");

    let approved = storefront
        .get("/admin/products?tab=approved")
        .await
        .text()
        .await
        .unwrap_or_default();
    assert!(approved.contains("Handloom saree"));
    assert!(approved.contains("Pashmina shawl"));
    assert_eq!(marketplace.count_calls(BOARD_FETCH), 3);
}

#[tokio::test]
async fn test_failed_status_change_leaves_board_unchanged() {
    let (marketplace, storefront) = admin_on_product_board().await;
    marketplace.fail_status_updates();

    let response = storefront
        .post_fragment(
            "/admin/products/status",
            &[("id", "p-lamp"), ("status", "rejected"), ("tab", "pending"), ("page", "1")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(marketplace.was_called("PATCH /products/p-lamp/status"));
    let trigger = hx_trigger(&response);
    assert!(trigger.contains(r#""level":"error""#), "{trigger}");
    assert!(trigger.contains("Moderation queue is offline"), "{trigger}");

    let fragment = response.text().await.unwrap_or_default();
    assert!(fragment.contains("Brass lamp"));
    assert!(fragment.contains("Handloom saree"));
    assert!(fragment.contains(r#"Pending <span class="count">2</span>"#), "{fragment}");
    assert!(fragment.contains(r#"Rejected <span class="count">0</span>"#), "{fragment}");

    let rejected = storefront
        .get("/admin/products?tab=rejected")
        .await
        .text()
        .await
        .unwrap_or_default();
    assert!(!rejected.contains("Brass lamp"));
    assert_eq!(marketplace.count_calls(BOARD_FETCH), 3);
}

#[tokio::test]
async fn test_unreadable_quantity_is_answered_with_a_toast() {
    let (marketplace, storefront) = start().await;
    storefront.login(Account::Shopper).await;
    let expected = "Quantity must be between 1 and 99";

    let response = storefront
        .post_fragment("/cart/update", &[("item_id", "line-1"), ("quantity", "")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(hx_trigger(&response).contains(expected));

    let response = storefront
        .post_fragment("/cart/add", &[("product_id", "p-saree"), ("quantity", "two")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(hx_trigger(&response).contains(expected));

    assert!(
        !marketplace
            .calls()
            .iter()
            .any(|c| c.starts_with("PATCH /carts") || c.ends_with("/items")),
        "{:?}",
        marketplace.calls()
    );
}

#[tokio::test]
async fn test_admin_dashboard_gathers_its_panels() {
    let (marketplace, storefront) = start().await;
    storefront.login(Account::Admin).await;

    let response = storefront.get("/admin").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap_or_default();
    assert!(body.contains("Handloom saree"), "{body}");

    for call in ["GET /stores", "GET /products/status/pending", "GET /auth/users/count"] {
        assert!(marketplace.was_called(call), "{call}: {:?}", marketplace.calls());
    }
}

#[tokio::test]
async fn test_missing_product_and_store_pages_are_not_found() {
    let (marketplace, storefront) = start().await;

    for path in ["/products/p-missing", "/stores/s-missing"] {
        let response = storefront.get(path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
    assert!(marketplace.was_called("GET /products/p-missing"));
    assert!(marketplace.was_called("GET /recommendations/product/p-missing"));
    assert!(marketplace.was_called("GET /stores/s-missing"));
    assert!(marketplace.was_called("GET /products"));
}
