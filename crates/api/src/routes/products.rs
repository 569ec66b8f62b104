//! Product catalog routes (public listing and admin CRUD).

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use drape_core::{CategoryId, CollectionId, ProductId};

use super::{DEFAULT_PAGE_SIZE, non_empty, page_and_limit, resolve_slug};
use crate::db::products::{ProductFilter, ProductInput, ProductSort};
use crate::db::{CategoryRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Category, ColorVariant, Product};
use crate::state::AppState;

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// Category slug.
    pub category: Option<String>,
    /// Collection slug.
    pub collection: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ProductQuery {
    fn into_filter(self, include_inactive: bool) -> ProductFilter {
        let (page, limit) = page_and_limit(self.page, self.limit, DEFAULT_PAGE_SIZE);
        ProductFilter {
            category_slug: non_empty(self.category),
            collection_slug: non_empty(self.collection),
            search: non_empty(self.search),
            min_price: self.min_price,
            max_price: self.max_price,
            featured: self.featured,
            include_inactive,
            sort: self.sort,
            page,
            limit,
        }
    }
}

/// One page of products.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

async fn list_page(state: &AppState, filter: ProductFilter) -> Result<Json<ProductPage>> {
    let (products, total) = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(ProductPage {
        products,
        page: filter.page,
        limit: filter.limit,
        total,
    }))
}

/// Public product listing.
///
/// GET /api/products
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductPage>> {
    list_page(&state, query.into_filter(false)).await
}

/// Admin listing, including inactive products.
///
/// GET /api/products/admin/all
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductPage>> {
    list_page(&state, query.into_filter(true)).await
}

/// Product with its category.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
}

/// Product detail by numeric ID or slug.
///
/// GET /api/products/{id_or_slug}
///
/// # Errors
///
/// Returns 404 for unknown or inactive products.
pub async fn show(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    let products = ProductRepository::new(state.pool());
    let product = match id_or_slug.parse::<i32>() {
        Ok(id) => products
            .get_by_id(ProductId::new(id))
            .await?
            .filter(|p| p.is_active),
        Err(_) => products.get_active_by_slug(&id_or_slug).await?,
    }
    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let category = match product.category_id {
        Some(id) => CategoryRepository::new(state.pool())
            .get_by_id(id)
            .await?
            .filter(|c| c.is_active),
        None => None,
    };

    Ok(Json(ProductDetail { product, category }))
}

/// Product create/update body. On update, omitted fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct ProductPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    /// `null` clears the discount.
    #[serde(default, deserialize_with = "super::double_option")]
    pub discount_price: Option<Option<Decimal>>,
    pub stock: Option<i32>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub category_id: Option<Option<CategoryId>>,
    pub images: Option<Vec<String>>,
    pub color_variants: Option<Vec<ColorVariant>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub fabric: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    /// Replaces the product's collection memberships when present.
    pub collection_ids: Option<Vec<CollectionId>>,
}

impl ProductPayload {
    /// Merge onto `existing` (if any) and validate.
    fn into_input(self, existing: Option<&Product>) -> std::result::Result<ProductInput, String> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .or_else(|| existing.map(|p| p.name.clone()))
            .filter(|n| !n.is_empty())
            .ok_or("Product name is required")?;

        let price = self
            .price
            .or_else(|| existing.map(|p| p.price))
            .ok_or("Price is required")?;
        if price <= Decimal::ZERO {
            return Err("Price must be greater than zero".to_string());
        }

        let discount_price = self
            .discount_price
            .unwrap_or_else(|| existing.and_then(|p| p.discount_price));
        if let Some(discount) = discount_price
            && (discount <= Decimal::ZERO || discount >= price)
        {
            return Err("Discount price must be between zero and the price".to_string());
        }

        let stock = self.stock.or_else(|| existing.map(|p| p.stock)).unwrap_or(0);
        if stock < 0 {
            return Err("Stock cannot be negative".to_string());
        }

        let slug = resolve_slug(
            self.slug.as_deref(),
            existing.map(|p| p.slug.as_str()),
            &name,
        )?;

        let color_variants = self
            .color_variants
            .or_else(|| existing.map(|p| p.color_variants.clone()))
            .unwrap_or_default();
        if color_variants.iter().any(|v| v.color.trim().is_empty()) {
            return Err("Every color variant needs a color name".to_string());
        }

        Ok(ProductInput {
            name,
            slug,
            description: self
                .description
                .or_else(|| existing.map(|p| p.description.clone()))
                .unwrap_or_default(),
            price,
            discount_price,
            stock,
            category_id: self
                .category_id
                .unwrap_or_else(|| existing.and_then(|p| p.category_id)),
            images: self
                .images
                .or_else(|| existing.map(|p| p.images.clone()))
                .unwrap_or_default()
                .into_iter()
                .filter(|i| !i.trim().is_empty())
                .collect(),
            color_variants,
            fabric: self
                .fabric
                .unwrap_or_else(|| existing.and_then(|p| p.fabric.clone())),
            is_active: self
                .is_active
                .or_else(|| existing.map(|p| p.is_active))
                .unwrap_or(true),
            is_featured: self
                .is_featured
                .or_else(|| existing.map(|p| p.is_featured))
                .unwrap_or(false),
        })
    }
}

/// Create a product.
///
/// POST /api/products
///
/// # Errors
///
/// Returns 400 for invalid fields and 409 for a duplicate slug.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(mut payload): Json<ProductPayload>,
) -> Result<(StatusCode, Json<Product>)> {
    let collection_ids = payload.collection_ids.take();
    let input = payload.into_input(None).map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool())
        .create(&input, collection_ids.as_deref())
        .await?;
    state.home_cache().invalidate();

    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product.
///
/// PUT /api/products/{id}
///
/// # Errors
///
/// Returns 404 for unknown products, 400 for invalid fields and 409 for a duplicate slug.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(mut payload): Json<ProductPayload>,
) -> Result<Json<Product>> {
    let products = ProductRepository::new(state.pool());
    let existing = products
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let collection_ids = payload.collection_ids.take();
    let input = payload
        .into_input(Some(&existing))
        .map_err(AppError::BadRequest)?;

    let product = products.update(id, &input, collection_ids.as_deref()).await?;
    state.home_cache().invalidate();

    tracing::info!(product_id = %id, admin_id = %admin.id, "Product updated");
    Ok(Json(product))
}

/// Delete a product.
///
/// DELETE /api/products/{id}
///
/// # Errors
///
/// Returns 404 for unknown products.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete(id).await?;
    state.home_cache().invalidate();

    tracing::info!(product_id = %id, admin_id = %admin.id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
