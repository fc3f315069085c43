//! Product and stock lookups.
//!
//! The cart only needs two reads from the catalog service: the live stock of
//! a product and its display record. [`Catalog`] is the seam; [`HttpCatalog`]
//! talks to the REST service.

mod http;

pub use http::HttpCatalog;

use async_trait::async_trait;
use rocketshoes_core::{Product, ProductId, Stock};
use thiserror::Error;

/// Errors that can occur when talking to the catalog service.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service has no such product.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// The service answered with a non-success status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured base URL cannot have paths appended.
    #[error("Invalid catalog base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Read access to product records and live stock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Current on-hand stock for a product.
    async fn stock(&self, product_id: ProductId) -> Result<Stock, CatalogError>;

    /// Display record for a product.
    async fn product(&self, product_id: ProductId) -> Result<Product, CatalogError>;
}
