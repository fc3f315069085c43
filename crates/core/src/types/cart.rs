//! The shopper's cart.
//!
//! A [`Cart`] is an immutable snapshot: every change produces a new value,
//! which is what gets persisted and then committed by the cart store.

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;
use super::price::Price;
use super::product::Product;

/// Errors decoding a persisted cart.
#[derive(Debug, Error)]
pub enum CartDecodeError {
    #[error("Invalid cart JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate cart entry for product {0}")]
    DuplicateEntry(ProductId),
}

const AMOUNT_FIELD: &str = "amount";

/// One product line in the cart.
///
/// Serialized as the product record with an `amount` field alongside it.
/// `amount` is never zero: a line that would drop to zero is removed instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    #[serde(flatten)]
    pub product: Product,
    pub amount: NonZeroU32,
}

impl CartEntry {
    /// An entry for `product`.
    ///
    /// A record's own `amount` field is dropped: the entry's amount takes its
    /// place in the serialized form.
    #[must_use]
    pub fn new(mut product: Product, amount: NonZeroU32) -> Self {
        product.fields.remove(AMOUNT_FIELD);
        Self { product, amount }
    }

    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product.id
    }

    /// Unit price times amount, `None` when the product has no usable price.
    #[must_use]
    pub fn subtotal(&self) -> Option<Price> {
        self.product
            .price()
            .map(|price| Price::new(price * Decimal::from(self.amount.get())))
    }
}

/// Ordered cart entries, unique by product id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartEntry>", into = "Vec<CartEntry>")]
pub struct Cart {
    entries: Vec<CartEntry>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Decode a persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, an entry has a zero or
    /// negative amount, or two entries share a product id.
    pub fn from_json(json: &str) -> Result<Self, CartDecodeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode the full snapshot for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if a product's metadata fields cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.entries)
    }

    #[must_use]
    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.product_id() == product_id)
    }

    /// Amount of a product in the cart, zero when absent.
    #[must_use]
    pub fn amount_of(&self, product_id: ProductId) -> u32 {
        self.get(product_id).map_or(0, |e| e.amount.get())
    }

    /// Product id to amount, for listings that badge each product.
    #[must_use]
    pub fn amounts(&self) -> BTreeMap<ProductId, u32> {
        self.entries
            .iter()
            .map(|e| (e.product_id(), e.amount.get()))
            .collect()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all amounts.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.amount.get())).sum()
    }

    /// Sum of the priced entries' subtotals.
    #[must_use]
    pub fn total(&self) -> Price {
        Price::new(
            self.entries
                .iter()
                .filter_map(CartEntry::subtotal)
                .map(|subtotal| subtotal.amount)
                .sum(),
        )
    }

    /// Snapshot with an existing entry's amount replaced.
    ///
    /// Returns `None` if the product is not in the cart.
    #[must_use]
    pub fn with_amount(&self, product_id: ProductId, amount: NonZeroU32) -> Option<Self> {
        let index = self.position(product_id)?;
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(index) {
            entry.amount = amount;
        }
        Some(next)
    }

    /// Snapshot with a product set to `amount`.
    ///
    /// An existing entry keeps its position and takes the new product record;
    /// otherwise the entry is appended.
    #[must_use]
    pub fn with_product(&self, product: Product, amount: NonZeroU32) -> Self {
        let mut next = self.clone();
        match next.position(product.id) {
            Some(index) => {
                if let Some(entry) = next.entries.get_mut(index) {
                    *entry = CartEntry::new(product, amount);
                }
            }
            None => next.entries.push(CartEntry::new(product, amount)),
        }
        next
    }

    /// Snapshot with a product removed.
    ///
    /// Returns `None` if the product is not in the cart.
    #[must_use]
    pub fn without(&self, product_id: ProductId) -> Option<Self> {
        let index = self.position(product_id)?;
        let mut next = self.clone();
        next.entries.remove(index);
        Some(next)
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.entries.iter().position(|e| e.product_id() == product_id)
    }
}

impl TryFrom<Vec<CartEntry>> for Cart {
    type Error = CartDecodeError;

    fn try_from(entries: Vec<CartEntry>) -> Result<Self, Self::Error> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.product_id()) {
                return Err(CartDecodeError::DuplicateEntry(entry.product_id()));
            }
        }
        Ok(Self { entries })
    }
}

impl From<Cart> for Vec<CartEntry> {
    fn from(cart: Cart) -> Self {
        cart.entries
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartEntry;
    type IntoIter = std::slice::Iter<'a, CartEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
