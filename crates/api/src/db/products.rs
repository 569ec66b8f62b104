//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use drape_core::{CategoryId, CollectionId, ProductId};

use super::collections::replace_product_collections;
use super::{RepositoryError, map_unique_violation};
use crate::models::{ColorVariant, Product};

const PRODUCT_COLUMNS: &str = r"
    p.id, p.name, p.slug, p.description, p.price, p.discount_price, p.stock,
    p.category_id, p.images, p.color_variants, p.fabric, p.is_active, p.is_featured,
    p.created_at, p.updated_at,
    ARRAY(
        SELECT cp.collection_id FROM collection_products cp
        WHERE cp.product_id = p.id
        ORDER BY cp.collection_id
    ) AS collection_ids";

/// Maximum page size for listings.
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    discount_price: Option<Decimal>,
    stock: i32,
    category_id: Option<CategoryId>,
    images: Vec<String>,
    color_variants: Json<Vec<ColorVariant>>,
    fabric: Option<String>,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    collection_ids: Vec<i32>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            slug: r.slug,
            description: r.description,
            price: r.price,
            discount_price: r.discount_price,
            stock: r.stock,
            category_id: r.category_id,
            images: r.images,
            color_variants: r.color_variants.0,
            fabric: r.fabric,
            is_active: r.is_active,
            is_featured: r.is_featured,
            collection_ids: r.collection_ids.into_iter().map(CollectionId::new).collect(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Sort orders for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id DESC",
            Self::PriceAsc => " ORDER BY COALESCE(p.discount_price, p.price) ASC, p.id",
            Self::PriceDesc => " ORDER BY COALESCE(p.discount_price, p.price) DESC, p.id",
            Self::Name => " ORDER BY p.name ASC, p.id",
        }
    }
}

/// Listing filters. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub collection_slug: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub include_inactive: bool,
    pub sort: ProductSort,
    /// 1-based page number.
    pub page: i64,
    pub limit: i64,
}

/// Full set of writable product fields.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub images: Vec<String>,
    pub color_variants: Vec<ColorVariant>,
    pub fabric: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
}

/// Repository for products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, returning the page and the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p"));
        push_filters(&mut query, filter);
        query.push(filter.sort.order_by());

        let (limit, offset) = super::limit_offset(filter.page, filter.limit);
        query.push(" LIMIT ").push_bind(limit);
        query.push(" OFFSET ").push_bind(offset);

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok((rows.into_iter().map(Product::from).collect(), total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Active featured products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products p
            WHERE p.is_active AND p.is_featured
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Active products of a collection in membership order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_in_collection(
        &self,
        collection_id: CollectionId,
        limit: Option<i64>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products p
            JOIN collection_products m ON m.product_id = p.id
            WHERE m.collection_id = $1 AND p.is_active
            ORDER BY m.position, p.id
            LIMIT $2
            "
        ))
        .bind(collection_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Create a product and, when given, its collection memberships.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        input: &ProductInput,
        collection_ids: Option<&[CollectionId]>,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO products
                (name, slug, description, price, discount_price, stock, category_id,
                 images, color_variants, fabric, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.discount_price)
        .bind(input.stock)
        .bind(input.category_id)
        .bind(&input.images)
        .bind(Json(&input.color_variants))
        .bind(input.fabric.as_deref())
        .bind(input.is_active)
        .bind(input.is_featured)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "product slug"))?;

        if let Some(ids) = collection_ids {
            replace_product_collections(&mut tx, id, ids).await?;
        }

        tx.commit().await?;
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace a product's fields and, when given, its collection memberships.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        collection_ids: Option<&[CollectionId]>,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE products
            SET name = $2, slug = $3, description = $4, price = $5, discount_price = $6,
                stock = $7, category_id = $8, images = $9, color_variants = $10,
                fabric = $11, is_active = $12, is_featured = $13, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.discount_price)
        .bind(input.stock)
        .bind(input.category_id)
        .bind(&input.images)
        .bind(Json(&input.color_variants))
        .bind(input.fabric.as_deref())
        .bind(input.is_active)
        .bind(input.is_featured)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "product slug"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(ids) = collection_ids {
            replace_product_collections(&mut tx, id, ids).await?;
        }

        tx.commit().await?;
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Cart lines and memberships go with it; orders keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    query.push(" WHERE TRUE");

    if !filter.include_inactive {
        query.push(" AND p.is_active");
    }
    if let Some(slug) = &filter.category_slug {
        query
            .push(" AND p.category_id = (SELECT id FROM categories WHERE slug = ")
            .push_bind(slug.clone())
            .push(")");
    }
    if let Some(slug) = &filter.collection_slug {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM collection_products cp \
                 JOIN collections c ON c.id = cp.collection_id \
                 WHERE cp.product_id = p.id AND c.slug = ",
            )
            .push_bind(slug.clone())
            .push(")");
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        query
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min) = filter.min_price {
        query
            .push(" AND COALESCE(p.discount_price, p.price) >= ")
            .push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query
            .push(" AND COALESCE(p.discount_price, p.price) <= ")
            .push_bind(max);
    }
    if let Some(featured) = filter.featured {
        query.push(" AND p.is_featured = ").push_bind(featured);
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("silk"), "silk");
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
    }

    #[test]
    fn test_filters_sql() {
        let filter = ProductFilter {
            category_slug: Some("sarees".to_string()),
            search: Some("  silk ".to_string()),
            min_price: Some(Decimal::new(1000, 0)),
            featured: Some(true),
            ..ProductFilter::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_filters(&mut query, &filter);
        let sql = query.sql();

        assert!(sql.contains("AND p.is_active"));
        assert!(sql.contains("slug = $1"));
        assert!(sql.contains("p.name ILIKE $2 OR p.description ILIKE $3"));
        assert!(sql.contains("COALESCE(p.discount_price, p.price) >= $4"));
        assert!(sql.contains("p.is_featured = $5"));
        assert!(!sql.contains("collection_products"));
    }

    #[test]
    fn test_admin_filter_includes_inactive() {
        let filter = ProductFilter {
            include_inactive: true,
            ..ProductFilter::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p");
        push_filters(&mut query, &filter);
        assert_eq!(query.sql(), "SELECT 1 FROM products p WHERE TRUE");
    }
}
