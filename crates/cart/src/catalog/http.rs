//! REST client for the product/stock service.
//!
//! Uses `reqwest` for HTTP. Product records are cached using `moka`
//! (5-minute TTL by default); stock is always fetched live.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::StatusCode;
use rocketshoes_core::{Product, ProductId, Stock};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::{Catalog, CatalogError};
use crate::config::CatalogConfig;

/// Client for the product/stock REST service.
///
/// Cheap to clone; clones share the connection pool and product cache.
#[derive(Clone)]
pub struct HttpCatalog {
    inner: Arc<HttpCatalogInner>,
}

/// Body of `GET stock/{id}`. Only `amount` is read; the product id is the
/// one that was asked for.
#[derive(Debug, Deserialize)]
struct StockResponse {
    amount: u32,
}

struct HttpCatalogInner {
    client: reqwest::Client,
    base_url: Url,
    products: Option<Cache<ProductId, Product>>,
}

impl HttpCatalog {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let products = config.product_cache_ttl.map(|ttl| {
            Cache::builder()
                .max_capacity(1000)
                .time_to_live(ttl)
                .build()
        });

        Ok(Self {
            inner: Arc::new(HttpCatalogInner {
                client,
                base_url: config.base_url.clone(),
                products,
            }),
        })
    }

    /// Resolve `{base}/{resource}/{id}`.
    fn endpoint(&self, resource: &str, product_id: ProductId) -> Result<Url, CatalogError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CatalogError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .push(resource)
            .push(&product_id.to_string());
        Ok(url)
    }

    /// GET a JSON document.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        product_id: ProductId,
    ) -> Result<T, CatalogError> {
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(product_id));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Catalog service returned non-success status"
            );
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse catalog response"
            );
            CatalogError::Parse(e)
        })
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Invalidate a cached product.
    pub async fn invalidate_product(&self, product_id: ProductId) {
        if let Some(cache) = &self.inner.products {
            cache.invalidate(&product_id).await;
        }
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        if let Some(cache) = &self.inner.products {
            cache.invalidate_all();
            cache.run_pending_tasks().await;
        }
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn stock(&self, product_id: ProductId) -> Result<Stock, CatalogError> {
        let url = self.endpoint("stock", product_id)?;
        let response: StockResponse = self.get_json(url, product_id).await?;
        debug!(available = response.amount, "Fetched stock");
        Ok(Stock {
            id: product_id,
            amount: response.amount,
        })
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn product(&self, product_id: ProductId) -> Result<Product, CatalogError> {
        if let Some(cache) = &self.inner.products
            && let Some(product) = cache.get(&product_id).await
        {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let url = self.endpoint("products", product_id)?;
        let product: Product = self.get_json(url, product_id).await?;

        if let Some(cache) = &self.inner.products {
            cache.insert(product_id, product.clone()).await;
        }

        Ok(product)
    }
}
