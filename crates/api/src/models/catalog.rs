//! Catalog domain types: categories, collections and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use drape_core::{CategoryId, CollectionId, ProductId};

/// A product category (one per product).
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Sort key; lower first.
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A curated collection (many-to-many with products).
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub priority: i32,
    pub is_active: bool,
    /// Member products in membership order.
    pub product_ids: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A color option with its own gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A sellable product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
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
    /// Collections this product belongs to.
    pub collection_ids: Vec<CollectionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The price a customer pays: `discount_price` when set, else `price`.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.discount_price.unwrap_or(self.price)
    }

    /// First gallery image, falling back to the first variant image.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images
            .first()
            .or_else(|| self.color_variants.iter().find_map(|v| v.images.first()))
            .map(String::as_str)
    }

    /// Whether `color` is one of the product's variants.
    ///
    /// Products without variants accept no color.
    #[must_use]
    pub fn has_color(&self, color: &str) -> bool {
        self.color_variants
            .iter()
            .any(|v| v.color.eq_ignore_ascii_case(color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new(1),
            name: "Kanjivaram Silk".to_string(),
            slug: "kanjivaram-silk".to_string(),
            description: String::new(),
            price: Decimal::new(4999, 0),
            discount_price: None,
            stock: 3,
            category_id: None,
            images: vec![],
            color_variants: vec![ColorVariant {
                color: "Ruby".to_string(),
                hex: Some("#9b111e".to_string()),
                images: vec!["/uploads/ruby.jpg".to_string()],
            }],
            fabric: Some("Silk".to_string()),
            is_active: true,
            is_featured: false,
            collection_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_effective_price_prefers_discount() {
        let mut p = product();
        assert_eq!(p.effective_price(), Decimal::new(4999, 0));
        p.discount_price = Some(Decimal::new(3999, 0));
        assert_eq!(p.effective_price(), Decimal::new(3999, 0));
    }

    #[test]
    fn test_primary_image_falls_back_to_variant() {
        let mut p = product();
        assert_eq!(p.primary_image(), Some("/uploads/ruby.jpg"));
        p.images = vec!["/uploads/main.jpg".to_string()];
        assert_eq!(p.primary_image(), Some("/uploads/main.jpg"));
    }

    #[test]
    fn test_has_color_is_case_insensitive() {
        let p = product();
        assert!(p.has_color("ruby"));
        assert!(!p.has_color("emerald"));
    }
}
