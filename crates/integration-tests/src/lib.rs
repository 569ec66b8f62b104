//! Integration test helpers for the Drape API.
//!
//! The tests in `tests/` talk to a running `drape-api` over HTTP and reach
//! into its database to set up state the API cannot create directly
//! (expired codes, prior coupon redemptions).
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and the API
//! cargo run -p drape-cli -- migrate
//! cargo run -p drape-api
//!
//! # Run integration tests
//! cargo test -p drape-integration-tests -- --ignored
//! ```
//!
//! `DRAPE_API_URL` points at the server (default `http://localhost:5000`) and
//! `DRAPE_DATABASE_URL` at the same database it uses.

use reqwest::Client;
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Base URL of the API under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("DRAPE_API_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// Build a URL under the API base.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// Connect to the API's database.
///
/// # Panics
///
/// Panics when `DRAPE_DATABASE_URL` is unset or the database is unreachable.
pub async fn pool() -> PgPool {
    let database_url =
        std::env::var("DRAPE_DATABASE_URL").expect("DRAPE_DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database")
}

/// A unique email address so tests can run repeatedly against one database.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@test.drape.store", uuid::Uuid::new_v4().simple())
}

/// A freshly registered customer.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: i32,
    pub email: String,
    pub token: String,
}

/// Register a customer with a password and return its bearer token.
///
/// # Panics
///
/// Panics when registration does not succeed.
pub async fn register_customer(client: &Client) -> Customer {
    let email = unique_email("customer");
    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "name": "Test Customer",
            "email": email,
            "password": "handloom-weaver-42",
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert!(resp.status().is_success(), "register failed: {}", resp.status());

    let body: Value = resp.json().await.expect("Invalid register response");
    Customer {
        id: body["user"]["id"]
            .as_i64()
            .and_then(|id| i32::try_from(id).ok())
            .expect("Missing user id"),
        email,
        token: body["token"].as_str().expect("Missing token").to_string(),
    }
}

/// Read the `message` field of an error body.
///
/// # Panics
///
/// Panics when the body is not JSON.
pub async fn error_message(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.expect("Error body is not JSON");
    body["message"].as_str().unwrap_or_default().to_string()
}
