//! Homepage aggregate, cached in-process.
//!
//! Admin writes to anything the homepage shows call [`HomeCache::invalidate`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, instrument};

use drape_core::SectionType;

use crate::db::{
    CategoryRepository, HomeSectionRepository, ProductRepository, RepositoryError,
    SettingsRepository,
};
use crate::models::{Category, HomeSection, Product};

/// Products resolved per product-bearing section.
pub const SECTION_PRODUCT_LIMIT: i64 = 8;

const CACHE_TTL: Duration = Duration::from_secs(60);

/// A home section with the products it displays.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSection {
    #[serde(flatten)]
    pub section: HomeSection,
    pub products: Vec<Product>,
}

/// Everything the storefront homepage renders.
#[derive(Debug, Clone, Serialize)]
pub struct Homepage {
    pub sections: Vec<ResolvedSection>,
    pub categories: Vec<Category>,
    pub announcement: Option<String>,
}

/// Single-entry cache for [`Homepage`].
///
/// Entries are keyed by an invalidation generation, so a build that was in
/// flight during [`HomeCache::invalidate`] lands under a key no reader asks for.
#[derive(Clone)]
pub struct HomeCache {
    cache: Cache<u64, Arc<Homepage>>,
    generation: Arc<AtomicU64>,
}

impl Default for HomeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HomeCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(CACHE_TTL)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached homepage, building it on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    #[instrument(skip_all)]
    pub async fn get(&self, pool: &PgPool) -> Result<Arc<Homepage>, RepositoryError> {
        let generation = self.current_generation();
        if let Some(page) = self.cache.get(&generation).await {
            debug!("Homepage cache hit");
            return Ok(page);
        }

        let page = Arc::new(build_homepage(pool).await?);
        self.cache.insert(generation, Arc::clone(&page)).await;
        Ok(page)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_all();
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

async fn build_homepage(pool: &PgPool) -> Result<Homepage, RepositoryError> {
    let sections = HomeSectionRepository::new(pool).list(false).await?;
    let products = ProductRepository::new(pool);

    let mut resolved = Vec::with_capacity(sections.len());
    for section in sections {
        let items = match (section.section_type, section.collection_id) {
            (SectionType::FeaturedProducts, _) => {
                products.list_featured(SECTION_PRODUCT_LIMIT).await?
            }
            (SectionType::CollectionShowcase, Some(collection_id)) => {
                products
                    .list_in_collection(collection_id, Some(SECTION_PRODUCT_LIMIT))
                    .await?
            }
            _ => Vec::new(),
        };
        resolved.push(ResolvedSection {
            section,
            products: items,
        });
    }

    let categories = CategoryRepository::new(pool).list(false).await?;
    let announcement = SettingsRepository::new(pool)
        .get()
        .await?
        .announcement
        .filter(|a| !a.trim().is_empty());

    Ok(Homepage {
        sections: resolved,
        categories,
        announcement,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page(announcement: &str) -> Arc<Homepage> {
        Arc::new(Homepage {
            sections: Vec::new(),
            categories: Vec::new(),
            announcement: Some(announcement.to_string()),
        })
    }

    #[tokio::test]
    async fn test_invalidate_clears_entry() {
        let cache = HomeCache::new();
        let generation = cache.current_generation();
        cache.cache.insert(generation, page("Free shipping over 1999")).await;
        assert!(cache.cache.get(&cache.current_generation()).await.is_some());

        cache.invalidate();
        assert!(cache.cache.get(&cache.current_generation()).await.is_none());
    }

    #[tokio::test]
    async fn test_build_finishing_after_invalidate_is_not_served() {
        let cache = HomeCache::new();
        // A reader starts building under the current generation...
        let started_at = cache.current_generation();
        // ...an admin write invalidates while the build is in flight...
        cache.invalidate();
        // ...and the stale build is then stored.
        cache.cache.insert(started_at, page("Old announcement")).await;

        assert_ne!(cache.current_generation(), started_at);
        assert!(cache.cache.get(&cache.current_generation()).await.is_none());
    }
}
