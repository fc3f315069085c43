//! Display data for a cart.
//!
//! Prices are pre-formatted so a renderer only has to lay them out.

use rocketshoes_core::{Cart, CartEntry, Price, ProductId};

/// Cart item display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub title: String,
    pub image: String,
    pub amount: u32,
    pub price: String,
    pub subtotal: String,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total: String,
    /// Number of distinct products, as shown on the header badge.
    pub item_count: usize,
    pub total_quantity: u64,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: "$0.00".to_string(),
            item_count: 0,
            total_quantity: 0,
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.entries().iter().map(CartItemView::from).collect(),
            total: cart.total().display(),
            item_count: cart.len(),
            total_quantity: cart.total_quantity(),
        }
    }
}

impl From<&CartEntry> for CartItemView {
    fn from(entry: &CartEntry) -> Self {
        Self {
            product_id: entry.product_id(),
            title: entry.product.title().unwrap_or_default().to_string(),
            image: entry.product.image().unwrap_or_default().to_string(),
            amount: entry.amount.get(),
            price: display_or_placeholder(entry.product.unit_price()),
            subtotal: display_or_placeholder(entry.subtotal()),
        }
    }
}

/// Shown in place of a price the catalog did not supply.
const NO_PRICE: &str = "-";

fn display_or_placeholder(price: Option<Price>) -> String {
    price.map_or_else(|| NO_PRICE.to_string(), |price| price.display())
}
