//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use drape_core::CategoryId;

use super::{RepositoryError, map_unique_violation};
use crate::models::Category;

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, image_url, priority, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: String,
    image_url: Option<String>,
    priority: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            slug: r.slug,
            description: r.description,
            image_url: r.image_url,
            priority: r.priority,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Full set of writable category fields.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub priority: i32,
    pub is_active: bool,
}

/// Repository for categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List categories ordered by priority then name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active OR $1 ORDER BY priority, name"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get an active category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1 AND is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> =
            sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(Category::from))
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let row: CategoryRow = sqlx::query_as(&format!(
            r"
            INSERT INTO categories (name, slug, description, image_url, priority, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.image_url.as_deref())
        .bind(input.priority)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "category slug"))?;

        Ok(row.into())
    }

    /// Replace a category's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            r"
            UPDATE categories
            SET name = $2, slug = $3, description = $4, image_url = $5,
                priority = $6, is_active = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.image_url.as_deref())
        .bind(input.priority)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "category slug"))?;

        row.map(Category::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Its products keep existing without a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set `priority` to each category's index in `ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn reorder(&self, ids: &[CategoryId]) -> Result<(), RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(CategoryId::as_i32).collect();
        sqlx::query(
            r"
            UPDATE categories c
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
