//! HTTP route handlers for the Drape JSON API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! POST /api/auth/send-otp          - Send a sign-in code (SMS, WhatsApp, email)
//! POST /api/auth/verify-otp        - Sign in with a code
//! POST /api/auth/register          - Create a password account
//! POST /api/auth/login             - Password sign-in
//! POST /api/auth/google            - Google ID token sign-in
//! GET  /api/auth/me                - Current user
//! PUT  /api/auth/me                - Update profile
//! POST /api/auth/bootstrap-admin   - Promote the first admin
//!
//! # Catalog
//! GET  /api/products               - Product listing (filters, sort, pagination)
//! GET  /api/products/admin/all     - Admin listing
//! GET  /api/products/{id_or_slug}  - Product detail
//! GET  /api/categories[/{slug}]    - Categories
//! GET  /api/collections[/{slug}]   - Collections with products
//!
//! # Cart (auth)
//! GET    /api/cart                 - Cart with totals
//! POST   /api/cart/items           - Add item
//! PUT    /api/cart/items/{line_id} - Set quantity (0 removes)
//! DELETE /api/cart/items/{line_id} - Remove item
//! DELETE /api/cart                 - Clear
//!
//! # Checkout and orders (auth)
//! POST /api/coupons/apply          - Preview a coupon
//! POST /api/orders                 - Place order
//! GET  /api/orders/mine            - Order history
//! GET  /api/orders/{id}            - Order detail
//! POST /api/orders/{id}/verify-payment, /upi-reference, /cancel, /return
//! GET  /api/orders/{id}/invoice    - PDF invoice
//!
//! # Storefront content
//! GET  /api/home-sections[/homepage]
//! GET  /api/settings
//!
//! # Admin
//! POST/PUT/DELETE on products, categories, collections, coupons, home sections
//! PUT  /api/{categories,collections,home-sections}/reorder
//! GET  /api/orders, PUT /api/orders/{id}/status, PUT /api/orders/{id}/return
//! PUT  /api/settings, POST /api/uploads
//! ```

pub mod auth;
pub mod cart;
pub mod categories;
pub mod collections;
pub mod coupons;
pub mod home_sections;
pub mod orders;
pub mod products;
pub mod settings;
pub mod uploads;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use serde::{Deserialize, Deserializer};

use drape_core::slugify;

use crate::db::MAX_PAGE;
use crate::db::products::MAX_PAGE_SIZE;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Page size when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Uploads may carry several files per request.
const MAX_FILES_PER_UPLOAD: usize = 10;

// =============================================================================
// Shared request helpers
// =============================================================================

/// `{ "ids": [...] }` body for reorder endpoints.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest<T> {
    pub ids: Vec<T>,
}

/// Page clamped to `1..=MAX_PAGE` and a limit clamped to `1..=MAX_PAGE_SIZE`.
#[must_use]
pub fn page_and_limit(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64) {
    (
        page.unwrap_or(1).clamp(1, MAX_PAGE),
        limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
    )
}

/// Trimmed value, or `None` when blank.
#[must_use]
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pick a slug: an explicit one (normalized), else the existing one, else
/// one derived from `name`.
///
/// All-digit slugs are refused since product paths read digits as an id.
///
/// # Errors
///
/// Returns a message when no usable slug can be produced.
pub fn resolve_slug(
    explicit: Option<&str>,
    existing: Option<&str>,
    name: &str,
) -> Result<String, String> {
    let slug = match (explicit, existing) {
        (Some(s), _) => slugify(s),
        (None, Some(existing)) => existing.to_string(),
        (None, None) => slugify(name),
    };
    if slug.is_empty() {
        return Err("A URL slug could not be derived; please provide one".to_string());
    }
    if slug.bytes().all(|b| b.is_ascii_digit()) {
        return Err("A URL slug needs at least one letter".to_string());
    }
    Ok(slug)
}

/// Deserialize a field that distinguishes "absent" (`None`) from `null`
/// (`Some(None)`). Use together with `#[serde(default)]`.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Routers
// =============================================================================

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/send-otp", post(auth::send_otp))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/google", post(auth::google))
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/bootstrap-admin", post(auth::bootstrap_admin))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/admin/all", get(products::admin_index))
        .route(
            "/{id_or_slug}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route("/admin/all", get(categories::admin_index))
        .route("/reorder", put(categories::reorder))
        .route(
            "/{slug}",
            get(categories::show)
                .put(categories::update)
                .delete(categories::delete),
        )
}

/// Create the collection routes router.
pub fn collection_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(collections::index).post(collections::create))
        .route("/admin/all", get(collections::admin_index))
        .route("/reorder", put(collections::reorder))
        .route(
            "/{slug}",
            get(collections::show)
                .put(collections::update)
                .delete(collections::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{line_id}",
            put(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::index).post(coupons::create))
        .route("/apply", post(coupons::apply))
        .route("/{id}", put(coupons::update).delete(coupons::delete))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::admin_index).post(orders::place))
        .route("/mine", get(orders::mine))
        .route("/{id}", get(orders::show))
        .route("/{id}/verify-payment", post(orders::verify_payment))
        .route("/{id}/upi-reference", post(orders::upi_reference))
        .route("/{id}/cancel", post(orders::cancel))
        .route(
            "/{id}/return",
            post(orders::request_return).put(orders::admin_decide_return),
        )
        .route("/{id}/invoice", get(orders::invoice))
        .route("/{id}/status", put(orders::admin_update_status))
}

/// Create the home section routes router.
pub fn home_section_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home_sections::index).post(home_sections::create))
        .route("/homepage", get(home_sections::homepage))
        .route("/admin/all", get(home_sections::admin_index))
        .route("/reorder", put(home_sections::reorder))
        .route(
            "/{id}",
            put(home_sections::update).delete(home_sections::delete),
        )
}

/// Create the settings routes router.
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/", get(settings::show).put(settings::update))
}

/// Create the upload routes router.
pub fn upload_routes(max_file_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", post(uploads::upload))
        .layer(DefaultBodyLimit::max(
            max_file_bytes.saturating_mul(MAX_FILES_PER_UPLOAD),
        ))
}

/// Create all `/api` routes.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    let api = Router::new()
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/collections", collection_routes())
        .nest("/cart", cart_routes())
        .nest("/coupons", coupon_routes())
        .nest("/orders", order_routes())
        .nest("/home-sections", home_section_routes())
        .nest("/settings", settings_routes())
        .nest("/uploads", upload_routes(max_upload_bytes))
        .layer(api_rate_limiter());

    Router::new()
        .nest("/api/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/api", api)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_and_limit() {
        assert_eq!(page_and_limit(None, None, 20), (1, 20));
        assert_eq!(page_and_limit(Some(-3), Some(0), 20), (1, 1));
        assert_eq!(page_and_limit(Some(4), Some(500), 20), (4, MAX_PAGE_SIZE));
    }

    #[test]
    fn test_page_and_limit_clamps_huge_page() {
        assert_eq!(
            page_and_limit(Some(i64::MAX), Some(i64::MAX), 20),
            (MAX_PAGE, MAX_PAGE_SIZE)
        );
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  silk ".to_string())).as_deref(), Some("silk"));
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_resolve_slug() {
        assert_eq!(
            resolve_slug(Some("My Custom Slug"), Some("old"), "Name").as_deref(),
            Ok("my-custom-slug")
        );
        assert_eq!(resolve_slug(None, Some("old"), "Name").as_deref(), Ok("old"));
        assert_eq!(
            resolve_slug(None, None, "Tussar Silk").as_deref(),
            Ok("tussar-silk")
        );
        assert!(resolve_slug(None, None, "✨✨").is_err());
    }

    #[test]
    fn test_resolve_slug_refuses_digits_only() {
        assert_eq!(
            resolve_slug(None, None, "1999").unwrap_err(),
            "A URL slug needs at least one letter"
        );
        assert!(resolve_slug(Some("2026"), None, "Festive Edit").is_err());
        assert_eq!(
            resolve_slug(Some("1999 Edit"), None, "1999").as_deref(),
            Ok("1999-edit")
        );
    }
}
