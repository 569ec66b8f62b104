//! Cart domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use drape_core::{CartItemId, ProductId};

/// One cart line joined with live product data.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub color: Option<String>,
    pub quantity: i32,
    /// Effective price at read time.
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Units currently in stock.
    pub stock: i32,
}

/// A user's cart with totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub subtotal: Decimal,
    /// Sum of line quantities.
    pub item_count: i64,
}

impl Cart {
    /// Build a cart and its totals from lines.
    #[must_use]
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let subtotal = items.iter().map(|l| l.line_total).sum();
        let item_count = items.iter().map(|l| i64::from(l.quantity)).sum();
        Self {
            items,
            subtotal,
            item_count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i32, qty: i32, price: i64) -> CartLine {
        let unit_price = Decimal::new(price, 0);
        CartLine {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            name: format!("Saree {id}"),
            slug: format!("saree-{id}"),
            image: None,
            color: None,
            quantity: qty,
            unit_price,
            line_total: unit_price * Decimal::from(qty),
            stock: 10,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::from_lines(vec![line(1, 2, 1500), line(2, 1, 999)]);
        assert_eq!(cart.subtotal, Decimal::new(3999, 0));
        assert_eq!(cart.item_count, 3);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from_lines(vec![]);
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal, Decimal::ZERO);
        assert_eq!(cart.item_count, 0);
    }
}
