//! Homepage section repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use drape_core::{CollectionId, HomeSectionId, SectionType};

use super::{RepositoryError, parse_column};
use crate::models::HomeSection;

const SECTION_COLUMNS: &str = "id, section_type, title, subtitle, image_url, link_url, \
     collection_id, position, is_active, content, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct HomeSectionRow {
    id: HomeSectionId,
    section_type: String,
    title: String,
    subtitle: Option<String>,
    image_url: Option<String>,
    link_url: Option<String>,
    collection_id: Option<CollectionId>,
    position: i32,
    is_active: bool,
    content: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<HomeSectionRow> for HomeSection {
    type Error = RepositoryError;

    fn try_from(r: HomeSectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            section_type: parse_column(&r.section_type, "section_type")?,
            title: r.title,
            subtitle: r.subtitle,
            image_url: r.image_url,
            link_url: r.link_url,
            collection_id: r.collection_id,
            position: r.position,
            is_active: r.is_active,
            content: r.content.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Full set of writable section fields.
#[derive(Debug, Clone)]
pub struct HomeSectionInput {
    pub section_type: SectionType,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub collection_id: Option<CollectionId>,
    pub position: i32,
    pub is_active: bool,
    pub content: serde_json::Value,
}

/// Repository for homepage sections.
pub struct HomeSectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> HomeSectionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Sections ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<HomeSection>, RepositoryError> {
        let rows: Vec<HomeSectionRow> = sqlx::query_as(&format!(
            "SELECT {SECTION_COLUMNS} FROM home_sections WHERE is_active OR $1 ORDER BY position, id"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(HomeSection::try_from).collect()
    }

    /// Get a section by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: HomeSectionId,
    ) -> Result<Option<HomeSection>, RepositoryError> {
        let row: Option<HomeSectionRow> =
            sqlx::query_as(&format!("SELECT {SECTION_COLUMNS} FROM home_sections WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(HomeSection::try_from).transpose()
    }

    /// Create a section.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &HomeSectionInput) -> Result<HomeSection, RepositoryError> {
        let row: HomeSectionRow = sqlx::query_as(&format!(
            r"
            INSERT INTO home_sections
                (section_type, title, subtitle, image_url, link_url, collection_id,
                 position, is_active, content)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SECTION_COLUMNS}
            "
        ))
        .bind(input.section_type.as_str())
        .bind(&input.title)
        .bind(input.subtitle.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.link_url.as_deref())
        .bind(input.collection_id)
        .bind(input.position)
        .bind(input.is_active)
        .bind(Json(&input.content))
        .fetch_one(self.pool)
        .await?;

        HomeSection::try_from(row)
    }

    /// Replace a section's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the section does not exist.
    pub async fn update(
        &self,
        id: HomeSectionId,
        input: &HomeSectionInput,
    ) -> Result<HomeSection, RepositoryError> {
        let row: Option<HomeSectionRow> = sqlx::query_as(&format!(
            r"
            UPDATE home_sections
            SET section_type = $2, title = $3, subtitle = $4, image_url = $5, link_url = $6,
                collection_id = $7, position = $8, is_active = $9, content = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SECTION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.section_type.as_str())
        .bind(&input.title)
        .bind(input.subtitle.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.link_url.as_deref())
        .bind(input.collection_id)
        .bind(input.position)
        .bind(input.is_active)
        .bind(Json(&input.content))
        .fetch_optional(self.pool)
        .await?;

        row.map(HomeSection::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a section.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the section does not exist.
    pub async fn delete(&self, id: HomeSectionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM home_sections WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set `position` to each section's index in `ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn reorder(&self, ids: &[HomeSectionId]) -> Result<(), RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(HomeSectionId::as_i32).collect();
        sqlx::query(
            r"
            UPDATE home_sections s
            SET position = (o.ord - 1)::int4, updated_at = NOW()
            FROM UNNEST($1::int4[]) WITH ORDINALITY AS o(id, ord)
            WHERE s.id = o.id
            ",
        )
        .bind(&ids)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
