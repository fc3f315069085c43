//! Cart operation errors.
//!
//! Operations keep a tagged [`CartError`] internally. The store's notifying
//! entry points collapse it to a single shopper-facing [`Notice`] via
//! [`CartError::notice`], so callers of those entry points only see whether
//! the cart changed.

use rocketshoes_core::ProductId;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::notify::Notice;
use crate::storage::StorageError;

pub const OUT_OF_STOCK_MESSAGE: &str = "Requested quantity is out of stock";
pub const ADD_FAILED_MESSAGE: &str = "Could not add product";
pub const REMOVE_FAILED_MESSAGE: &str = "Could not remove product";
pub const UPDATE_FAILED_MESSAGE: &str = "Could not change product quantity";

/// Error type for cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Requested amount exceeds on-hand stock.
    #[error("Requested {requested} of product {product_id} but only {available} in stock")]
    OutOfStock {
        product_id: ProductId,
        requested: u64,
        available: u32,
    },

    /// The catalog has no such product.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product is not in the cart.
    #[error("Product {0} is not in the cart")]
    EntryNotFound(ProductId),

    /// A catalog lookup failed.
    #[error("Catalog lookup failed: {0}")]
    Lookup(#[source] CatalogError),

    /// The new snapshot could not be persisted.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The new snapshot could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<CatalogError> for CartError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(product_id) => Self::ProductNotFound(product_id),
            other => Self::Lookup(other),
        }
    }
}

impl CartError {
    /// Whether this is the expected "not enough stock" outcome rather than
    /// a failure.
    #[must_use]
    pub const fn is_out_of_stock(&self) -> bool {
        matches!(self, Self::OutOfStock { .. })
    }

    /// The one notice shown to the shopper for this error.
    #[must_use]
    pub fn notice(&self, operation: Operation) -> Notice {
        if self.is_out_of_stock() {
            Notice::error(OUT_OF_STOCK_MESSAGE)
        } else {
            Notice::error(operation.failure_message())
        }
    }
}

/// The cart's mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Remove,
    UpdateAmount,
}

impl Operation {
    /// Generic message for a failed operation.
    #[must_use]
    pub const fn failure_message(self) -> &'static str {
        match self {
            Self::Add => ADD_FAILED_MESSAGE,
            Self::Remove => REMOVE_FAILED_MESSAGE,
            Self::UpdateAmount => UPDATE_FAILED_MESSAGE,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add_product"),
            Self::Remove => write!(f, "remove_product"),
            Self::UpdateAmount => write!(f, "update_product_amount"),
        }
    }
}
