//! Database operations for the Drape `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users` - Customers and admins (password, OTP, Google)
//! - `categories`, `collections`, `collection_products` - Catalog structure
//! - `products` - Catalog items with images and color variants
//! - `cart_items` - One row per cart line
//! - `orders` - Placed orders with item snapshots
//! - `coupons`, `coupon_redemptions` - Discount codes and who used them
//! - `home_sections` - Homepage content blocks
//! - `store_settings` - Singleton store configuration
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p drape-cli -- migrate
//! ```

pub mod cart;
pub mod categories;
pub mod collections;
pub mod coupons;
pub mod home_sections;
pub mod orders;
pub mod products;
pub mod settings;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use categories::CategoryRepository;
pub use collections::CollectionRepository;
pub use coupons::CouponRepository;
pub use home_sections::HomeSectionRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use settings::SettingsRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Deepest page a listing serves; larger page numbers are clamped to it.
pub const MAX_PAGE: i64 = 10_000;

/// `LIMIT` and `OFFSET` for a 1-based page, both kept inside listing bounds.
pub(crate) fn limit_offset(page: i64, limit: i64) -> (i64, i64) {
    let limit = limit.clamp(1, products::MAX_PAGE_SIZE);
    let page = page.clamp(1, MAX_PAGE);
    (limit, (page - 1) * limit)
}

/// Parse a `TEXT` column into a domain type.
pub(crate) fn parse_column<T>(value: &str, column: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| {
        RepositoryError::DataCorruption(format!("invalid {column} in database: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use drape_core::OrderStatus;

    use super::*;

    #[test]
    fn test_parse_column_ok() {
        let status: OrderStatus =
            parse_column("shipped", "order_status").unwrap_or(OrderStatus::Placed);
        assert_eq!(status, OrderStatus::Shipped);
    }

    #[test]
    fn test_limit_offset() {
        assert_eq!(limit_offset(1, 20), (20, 0));
        assert_eq!(limit_offset(3, 20), (20, 40));
        assert_eq!(limit_offset(0, 0), (1, 0));
        assert_eq!(limit_offset(2, 1_000), (100, 100));
    }

    #[test]
    fn test_limit_offset_huge_page_does_not_overflow() {
        let (limit, offset) = limit_offset(i64::MAX, i64::MAX);
        assert_eq!(limit, 100);
        assert_eq!(offset, (MAX_PAGE - 1) * 100);
        assert_eq!(limit_offset(i64::MIN, 20), (20, 0));
    }

    #[test]
    fn test_parse_column_corrupt() {
        let err = parse_column::<OrderStatus>("lost", "order_status").unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::DataCorruption(msg) if msg.contains("order_status")
        ));
    }
}
