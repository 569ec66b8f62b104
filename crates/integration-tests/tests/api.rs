//! End-to-end tests against a running API.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`drape-cli migrate`)
//! - The API server running (`cargo run -p drape-api`)
//! - `DRAPE_DATABASE_URL` pointing at the same database
//!
//! Run with: cargo test -p drape-integration-tests -- --ignored

use drape_integration_tests::{error_message, pool, register_customer, url};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_health_reports_ok() {
    let resp = Client::new()
        .get(url("/health"))
        .send()
        .await
        .expect("Failed to reach API");

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_readiness_checks_database() {
    let resp = Client::new()
        .get(url("/health/ready"))
        .send()
        .await
        .expect("Failed to reach API");

    assert_eq!(resp.status(), StatusCode::OK);
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_cart_requires_token() {
    let resp = Client::new()
        .get(url("/api/cart"))
        .send()
        .await
        .expect("Failed to reach API");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_register_then_fetch_profile() {
    let client = Client::new();
    let customer = register_customer(&client).await;

    let resp = client
        .get(url("/api/auth/me"))
        .bearer_auth(&customer.token)
        .send()
        .await
        .expect("Failed to fetch profile");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid profile");
    assert_eq!(body["email"], customer.email.as_str());
    assert_eq!(body["is_admin"], false);
}

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_duplicate_registration_conflicts() {
    let client = Client::new();
    let customer = register_customer(&client).await;

    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "name": "Someone Else",
            "email": customer.email,
            "password": "another-long-pass",
        }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_customer_cannot_reach_admin_routes() {
    let client = Client::new();
    let customer = register_customer(&client).await;

    let resp = client
        .get(url("/api/orders"))
        .bearer_auth(&customer.token)
        .send()
        .await
        .expect("Failed to reach API");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_expired_otp_is_rejected() {
    let client = Client::new();
    let db = pool().await;
    let customer = register_customer(&client).await;

    sqlx::query(
        "UPDATE users SET otp_code = '482913', otp_expires_at = NOW() - INTERVAL '1 minute' \
         WHERE id = $1",
    )
    .bind(customer.id)
    .execute(&db)
    .await
    .expect("Failed to plant OTP");

    let resp = client
        .post(url("/api/auth/verify-otp"))
        .json(&json!({ "email": customer.email, "otp": "482913" }))
        .send()
        .await
        .expect("Failed to send verify request");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(resp).await,
        "OTP has expired, please request a new one"
    );
}

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_valid_otp_signs_in_once() {
    let client = Client::new();
    let db = pool().await;
    let customer = register_customer(&client).await;

    sqlx::query(
        "UPDATE users SET otp_code = '105577', otp_expires_at = NOW() + INTERVAL '5 minutes' \
         WHERE id = $1",
    )
    .bind(customer.id)
    .execute(&db)
    .await
    .expect("Failed to plant OTP");

    let verify = || {
        client
            .post(url("/api/auth/verify-otp"))
            .json(&json!({ "email": customer.email, "otp": "105577" }))
            .send()
    };

    let first = verify().await.expect("Failed to send verify request");
    assert_eq!(first.status(), StatusCode::OK);
    let body: Value = first.json().await.expect("Invalid auth response");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

    // The code is consumed on success.
    let second = verify().await.expect("Failed to send verify request");
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_order_from_empty_cart_is_rejected() {
    let client = Client::new();
    let customer = register_customer(&client).await;

    let resp = client
        .post(url("/api/orders"))
        .bearer_auth(&customer.token)
        .json(&json!({
            "payment_method": "cod",
            "shipping_address": {
                "name": "Test Customer",
                "phone": "9876543210",
                "line1": "12 Weavers Lane",
                "city": "Varanasi",
                "state": "Uttar Pradesh",
                "pincode": "221001",
            },
        }))
        .send()
        .await
        .expect("Failed to send order request");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(resp).await, "Your cart is empty");
}

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_coupon_applies_once_per_customer() {
    let client = Client::new();
    let db = pool().await;
    let customer = register_customer(&client).await;

    let code = format!("FLAT{}", uuid::Uuid::new_v4().simple()).to_uppercase();
    let coupon_id: i32 = sqlx::query_scalar(
        "INSERT INTO coupons (code, discount_type, value) VALUES ($1, 'flat', 500) RETURNING id",
    )
    .bind(&code)
    .fetch_one(&db)
    .await
    .expect("Failed to insert coupon");

    let apply = || {
        client
            .post(url("/api/coupons/apply"))
            .bearer_auth(&customer.token)
            .json(&json!({ "code": code.to_lowercase(), "amount": "300" }))
            .send()
    };

    // Flat discount never exceeds the amount.
    let resp = apply().await.expect("Failed to apply coupon");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid coupon response");
    let discount: Decimal = body["discount"]
        .as_str()
        .and_then(|d| d.parse().ok())
        .expect("Missing discount");
    assert_eq!(discount, Decimal::from(300));

    sqlx::query("INSERT INTO coupon_redemptions (coupon_id, user_id) VALUES ($1, $2)")
        .bind(coupon_id)
        .bind(customer.id)
        .execute(&db)
        .await
        .expect("Failed to record redemption");

    let resp = apply().await.expect("Failed to apply coupon");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(resp).await,
        "You have already used this coupon"
    );
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_product_listing_is_paginated() {
    let resp = Client::new()
        .get(url("/api/products?page=1&limit=5"))
        .send()
        .await
        .expect("Failed to list products");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid product page");
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 5);
    assert!(body["products"].as_array().is_some_and(|p| p.len() <= 5));
}

#[tokio::test]
#[ignore = "Requires running drape-api and database"]
async fn test_unknown_product_is_not_found() {
    let resp = Client::new()
        .get(url("/api/products/no-such-saree-anywhere"))
        .send()
        .await
        .expect("Failed to fetch product");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
