//! Collection repository and collection membership.
//!
//! Membership lives in `collection_products`. Both directions (a collection's
//! products, a product's collections) are replaced transactionally so the
//! two views never disagree.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use drape_core::{CollectionId, ProductId};

use super::{RepositoryError, map_unique_violation};
use crate::models::Collection;

const COLLECTION_COLUMNS: &str = r"
    c.id, c.name, c.slug, c.description, c.image_url, c.priority, c.is_active,
    c.created_at, c.updated_at,
    ARRAY(
        SELECT cp.product_id FROM collection_products cp
        WHERE cp.collection_id = c.id
        ORDER BY cp.position, cp.product_id
    ) AS product_ids";

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: CollectionId,
    name: String,
    slug: String,
    description: String,
    image_url: Option<String>,
    priority: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_ids: Vec<i32>,
}

impl From<CollectionRow> for Collection {
    fn from(r: CollectionRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            slug: r.slug,
            description: r.description,
            image_url: r.image_url,
            priority: r.priority,
            is_active: r.is_active,
            product_ids: r.product_ids.into_iter().map(ProductId::new).collect(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Full set of writable collection fields.
#[derive(Debug, Clone)]
pub struct CollectionInput {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub priority: i32,
    pub is_active: bool,
}

/// Repository for collections.
pub struct CollectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CollectionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List collections ordered by priority then name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Collection>, RepositoryError> {
        let rows: Vec<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections c WHERE c.is_active OR $1 ORDER BY c.priority, c.name"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Collection::from).collect())
    }

    /// Get an active collection by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Collection>, RepositoryError> {
        let row: Option<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections c WHERE c.slug = $1 AND c.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Collection::from))
    }

    /// Get a collection by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CollectionId) -> Result<Option<Collection>, RepositoryError> {
        let row: Option<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Collection::from))
    }

    /// Create a collection, optionally with an initial product list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        input: &CollectionInput,
        product_ids: Option<&[ProductId]>,
    ) -> Result<Collection, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: CollectionId = sqlx::query_scalar(
            r"
            INSERT INTO collections (name, slug, description, image_url, priority, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.image_url.as_deref())
        .bind(input.priority)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "collection slug"))?;

        if let Some(ids) = product_ids {
            replace_collection_products(&mut tx, id, ids).await?;
        }

        tx.commit().await?;
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace a collection's fields and, when given, its product list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: CollectionId,
        input: &CollectionInput,
        product_ids: Option<&[ProductId]>,
    ) -> Result<Collection, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE collections
            SET name = $2, slug = $3, description = $4, image_url = $5,
                priority = $6, is_active = $7, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.image_url.as_deref())
        .bind(input.priority)
        .bind(input.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "collection slug"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(ids) = product_ids {
            replace_collection_products(&mut tx, id, ids).await?;
        }

        tx.commit().await?;
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a collection and its memberships.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection does not exist.
    pub async fn delete(&self, id: CollectionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set `priority` to each collection's index in `ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn reorder(&self, ids: &[CollectionId]) -> Result<(), RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(CollectionId::as_i32).collect();
        sqlx::query(
            r"
            UPDATE collections c
            SET priority = (o.ord - 1)::int4, updated_at = NOW()
            FROM UNNEST($1::int4[]) WITH ORDINALITY AS o(id, ord)
            WHERE c.id = o.id
            ",
        )
        .bind(&ids)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

/// Make `product_ids` (in order) the exact membership of a collection.
///
/// Unknown product IDs are ignored.
pub(crate) async fn replace_collection_products(
    conn: &mut PgConnection,
    collection_id: CollectionId,
    product_ids: &[ProductId],
) -> Result<(), RepositoryError> {
    let ids: Vec<i32> = product_ids.iter().map(ProductId::as_i32).collect();

    sqlx::query("DELETE FROM collection_products WHERE collection_id = $1")
        .bind(collection_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r"
        INSERT INTO collection_products (collection_id, product_id, position)
        SELECT $1, o.id, MIN(o.ord)::int4 - 1
        FROM UNNEST($2::int4[]) WITH ORDINALITY AS o(id, ord)
        JOIN products p ON p.id = o.id
        GROUP BY o.id
        ",
    )
    .bind(collection_id)
    .bind(&ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Make `collection_ids` the exact set of collections a product belongs to.
///
/// Existing memberships keep their position; new ones are appended to the
/// end of each collection. Unknown collection IDs are ignored.
pub(crate) async fn replace_product_collections(
    conn: &mut PgConnection,
    product_id: ProductId,
    collection_ids: &[CollectionId],
) -> Result<(), RepositoryError> {
    let ids: Vec<i32> = collection_ids.iter().map(CollectionId::as_i32).collect();

    sqlx::query(
        "DELETE FROM collection_products WHERE product_id = $1 AND NOT (collection_id = ANY($2))",
    )
    .bind(product_id)
    .bind(&ids)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        INSERT INTO collection_products (collection_id, product_id, position)
        SELECT c.id, $1,
               COALESCE((SELECT MAX(position) + 1 FROM collection_products
                         WHERE collection_id = c.id), 0)
        FROM collections c
        WHERE c.id = ANY($2)
        ON CONFLICT (collection_id, product_id) DO NOTHING
        ",
    )
    .bind(product_id)
    .bind(&ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
