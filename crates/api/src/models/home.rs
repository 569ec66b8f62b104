//! Homepage content blocks.

use chrono::{DateTime, Utc};
use serde::Serialize;

use drape_core::{CollectionId, HomeSectionId, SectionType};

/// An admin-configured block on the storefront homepage.
#[derive(Debug, Clone, Serialize)]
pub struct HomeSection {
    pub id: HomeSectionId,
    pub section_type: SectionType,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    /// Source collection for `collection_showcase` blocks.
    pub collection_id: Option<CollectionId>,
    pub position: i32,
    pub is_active: bool,
    /// Free-form extra fields rendered by the frontend.
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
