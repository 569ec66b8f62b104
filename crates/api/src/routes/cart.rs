//! Cart route handlers. Every route requires a signed-in customer.
//!
//! Prices are never stored with a line; each read joins live product data.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use drape_core::{CartItemId, ProductId, UserId};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Cart, Product};
use crate::state::AppState;

/// Add-to-cart body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i32,
    pub color: Option<String>,
}

const fn one() -> i32 {
    1
}

/// Quantity change body.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

async fn load_cart(state: &AppState, user_id: UserId) -> Result<Json<Cart>> {
    let lines = CartRepository::new(state.pool()).list_lines(user_id).await?;
    Ok(Json(Cart::from_lines(lines)))
}

/// Check that `wanted` units of `product` (in `color`) can go in a cart.
fn check_availability(
    product: &Product,
    color: Option<&str>,
    wanted: i32,
) -> std::result::Result<(), String> {
    if !product.is_active {
        return Err("This product is no longer available".to_string());
    }
    if let Some(color) = color
        && !product.has_color(color)
    {
        return Err(format!("{} is not available in {color}", product.name));
    }
    if wanted > product.stock {
        return Err(match product.stock {
            0 => format!("{} is out of stock", product.name),
            n => format!("Only {n} of {} left in stock", product.name),
        });
    }
    Ok(())
}

/// GET /api/cart
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>> {
    load_cart(&state, user.id).await
}

/// Add units of a product, merging with an existing line of the same color.
///
/// POST /api/cart/items
///
/// # Errors
///
/// Returns 400 when the product is inactive or the total would exceed stock.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %req.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<Cart>> {
    if req.quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }
    let color = req
        .color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let product = ProductRepository::new(state.pool())
        .get_by_id(req.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let cart = CartRepository::new(state.pool());
    let in_cart = cart.quantity_of(user.id, product.id, color).await?;
    check_availability(&product, color, in_cart.saturating_add(req.quantity))
        .map_err(AppError::BadRequest)?;

    cart.add(user.id, product.id, req.quantity, color).await?;
    load_cart(&state, user.id).await
}

/// Set a line's quantity; zero removes it.
///
/// PUT /api/cart/items/{line_id}
///
/// # Errors
///
/// Returns 404 for unknown lines and 400 when the quantity exceeds stock.
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(line_id): Path<CartItemId>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.pool());
    let line = cart
        .get_line(user.id, line_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

    match req.quantity {
        q if q < 0 => {
            return Err(AppError::BadRequest("Quantity cannot be negative".to_string()));
        }
        0 => cart.remove(user.id, line.id).await?,
        q => {
            let product = ProductRepository::new(state.pool())
                .get_by_id(line.product_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
            check_availability(&product, None, q).map_err(AppError::BadRequest)?;
            cart.set_quantity(user.id, line.id, q).await?;
        }
    }

    load_cart(&state, user.id).await
}

/// DELETE /api/cart/items/{line_id}
///
/// # Errors
///
/// Returns 404 for unknown lines.
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(line_id): Path<CartItemId>,
) -> Result<Json<Cart>> {
    CartRepository::new(state.pool()).remove(user.id, line_id).await?;
    load_cart(&state, user.id).await
}

/// DELETE /api/cart
///
/// # Errors
///
/// Returns 500 if the delete fails.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(Json(Cart::from_lines(Vec::new())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::ColorVariant;

    fn product(stock: i32) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Banarasi Silk".to_string(),
            slug: "banarasi-silk".to_string(),
            description: String::new(),
            price: Decimal::new(4999, 0),
            discount_price: None,
            stock,
            category_id: None,
            images: Vec::new(),
            color_variants: vec![ColorVariant {
                color: "Maroon".to_string(),
                hex: None,
                images: Vec::new(),
            }],
            fabric: None,
            is_active: true,
            is_featured: false,
            collection_ids: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_availability_within_stock() {
        assert!(check_availability(&product(3), Some("maroon"), 3).is_ok());
    }

    #[test]
    fn test_availability_over_stock() {
        let err = check_availability(&product(2), None, 3).unwrap_err();
        assert_eq!(err, "Only 2 of Banarasi Silk left in stock");
        let err = check_availability(&product(0), None, 1).unwrap_err();
        assert_eq!(err, "Banarasi Silk is out of stock");
    }

    #[test]
    fn test_availability_unknown_color() {
        let err = check_availability(&product(5), Some("Teal"), 1).unwrap_err();
        assert_eq!(err, "Banarasi Silk is not available in Teal");
    }

    #[test]
    fn test_availability_inactive() {
        let mut p = product(5);
        p.is_active = false;
        assert!(check_availability(&p, None, 1).is_err());
    }

    #[test]
    fn test_add_request_defaults_quantity() {
        let req: AddItemRequest =
            serde_json::from_value(serde_json::json!({ "product_id": 7 })).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.color.is_none());
    }
}
