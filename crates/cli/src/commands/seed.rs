//! Seed catalog structure and store settings from a YAML file.
//!
//! Categories and collections are upserted by slug, so re-running a seed file
//! updates entries instead of duplicating them. Settings are merged field by
//! field; keys missing from the file keep their current value.
//!
//! ```yaml
//! settings:
//!   store_name: Drape
//!   shipping_fee: "99"
//!   free_shipping_threshold: "1999"
//!   upi_enabled: true
//!   upi_vpa: drape@okicici
//! categories:
//!   - name: Silk Sarees
//!     priority: 1
//! collections:
//!   - name: Wedding Edit
//!     description: Heirloom weaves for the big day
//! ```

use std::path::Path;

use drape_api::db::categories::CategoryInput;
use drape_api::db::collections::CollectionInput;
use drape_api::db::{CategoryRepository, CollectionRepository, RepositoryError, SettingsRepository};
use drape_api::models::StoreSettings;
use drape_core::slugify;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::ConnectError;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid seed entry: {0}")]
    Invalid(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Top-level seed document.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub settings: Option<SeedSettings>,
    #[serde(default)]
    pub categories: Vec<SeedEntry>,
    #[serde(default)]
    pub collections: Vec<SeedEntry>,
}

/// A category or collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedEntry {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "active")]
    pub is_active: bool,
}

const fn active() -> bool {
    true
}

impl SeedEntry {
    fn slug(&self) -> Result<String, SeedError> {
        let slug = slugify(self.slug.as_deref().unwrap_or(&self.name));
        if slug.is_empty() {
            return Err(SeedError::Invalid(format!("no usable slug for {:?}", self.name)));
        }
        Ok(slug)
    }
}

/// Settings keys a seed file may set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedSettings {
    pub store_name: Option<String>,
    pub support_email: Option<String>,
    pub support_phone: Option<String>,
    pub shipping_fee: Option<Decimal>,
    pub free_shipping_threshold: Option<Decimal>,
    pub cod_enabled: Option<bool>,
    pub cod_fee: Option<Decimal>,
    pub upi_enabled: Option<bool>,
    pub upi_vpa: Option<String>,
    pub upi_payee_name: Option<String>,
    pub upi_discount_percent: Option<Decimal>,
    pub razorpay_enabled: Option<bool>,
    pub return_window_days: Option<i32>,
    pub announcement: Option<String>,
}

impl SeedSettings {
    fn apply(self, mut s: StoreSettings) -> StoreSettings {
        if let Some(v) = self.store_name {
            s.store_name = v;
        }
        if let Some(v) = self.shipping_fee {
            s.shipping_fee = v;
        }
        if let Some(v) = self.cod_enabled {
            s.cod_enabled = v;
        }
        if let Some(v) = self.cod_fee {
            s.cod_fee = v;
        }
        if let Some(v) = self.upi_enabled {
            s.upi_enabled = v;
        }
        if let Some(v) = self.upi_discount_percent {
            s.upi_discount_percent = v;
        }
        if let Some(v) = self.razorpay_enabled {
            s.razorpay_enabled = v;
        }
        if let Some(v) = self.return_window_days {
            s.return_window_days = v;
        }
        s.support_email = self.support_email.or(s.support_email);
        s.support_phone = self.support_phone.or(s.support_phone);
        s.free_shipping_threshold = self.free_shipping_threshold.or(s.free_shipping_threshold);
        s.upi_vpa = self.upi_vpa.or(s.upi_vpa);
        s.upi_payee_name = self.upi_payee_name.or(s.upi_payee_name);
        s.announcement = self.announcement.or(s.announcement);
        s
    }
}

/// Parse a seed document.
///
/// # Errors
///
/// Returns `SeedError::Yaml` for malformed documents or unknown keys.
pub fn parse(content: &str) -> Result<SeedFile, SeedError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Seed the database from `file_path`.
///
/// # Errors
///
/// Returns `SeedError` if the file is missing or invalid, or a write fails.
pub async fn run(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading seed file");
    let seed = parse(&tokio::fs::read_to_string(path).await?)?;

    // Validate everything before touching the database
    for entry in seed.categories.iter().chain(&seed.collections) {
        entry.slug()?;
    }

    let pool = crate::connect().await?;

    if let Some(settings) = seed.settings {
        let repo = SettingsRepository::new(&pool);
        let merged = settings.apply(repo.get().await?);
        repo.update(&merged).await?;
        info!("Settings updated");
    }

    let categories = CategoryRepository::new(&pool);
    let existing = categories.list(true).await?;
    let (mut created, mut updated) = (0, 0);
    for entry in &seed.categories {
        let input = CategoryInput {
            slug: entry.slug()?,
            name: entry.name.clone(),
            description: entry.description.clone(),
            image_url: entry.image_url.clone(),
            priority: entry.priority,
            is_active: entry.is_active,
        };
        match existing.iter().find(|c| c.slug == input.slug) {
            Some(c) => {
                categories.update(c.id, &input).await?;
                updated += 1;
            }
            None => {
                categories.create(&input).await?;
                created += 1;
            }
        }
    }
    info!(created, updated, "Categories seeded");

    let collections = CollectionRepository::new(&pool);
    let existing = collections.list(true).await?;
    let (mut created, mut updated) = (0, 0);
    for entry in &seed.collections {
        let input = CollectionInput {
            slug: entry.slug()?,
            name: entry.name.clone(),
            description: entry.description.clone(),
            image_url: entry.image_url.clone(),
            priority: entry.priority,
            is_active: entry.is_active,
        };
        // Membership is managed from the admin UI; seeding leaves it alone.
        match existing.iter().find(|c| c.slug == input.slug) {
            Some(c) => {
                collections.update(c.id, &input, None).await?;
                updated += 1;
            }
            None => {
                collections.create(&input, None).await?;
                created += 1;
            }
        }
    }
    info!(created, updated, "Collections seeded");

    info!("Seeding complete!");
    Ok(())
}
