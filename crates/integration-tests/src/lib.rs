//! Integration tests for the RocketShoes cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p rocketshoes-integration-tests
//! ```
//!
//! Tests run the real `HttpCatalog` and `FileStorage` against [`FakeCatalog`],
//! an in-process `axum` stand-in for the product/stock service bound to an
//! ephemeral port. No external services are needed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rocketshoes_cart::{
    BufferedNotifier, CartStore, CatalogConfig, FileStorage, HttpCatalog,
};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

/// Storage key used by every test session.
pub const STORAGE_KEY: &str = "@RocketShoes:cart";

/// In-memory product/stock service.
///
/// Clones share state, so a test can change stock while a server built from
/// the same catalog is running.
#[derive(Clone, Default)]
pub struct FakeCatalog {
    inner: Arc<Mutex<FakeCatalogState>>,
}

#[derive(Default)]
struct FakeCatalogState {
    products: HashMap<i32, Value>,
    stock: HashMap<i32, u32>,
    failure: Option<StatusCode>,
    stock_requests: usize,
    product_requests: usize,
}

impl FakeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product with its stock.
    #[must_use]
    pub fn with_product(self, id: i32, title: &str, price: f64, stock: u32) -> Self {
        self.with_record(
            json!({
                "id": id,
                "title": title,
                "price": price,
                "image": format!("https://rocketseat-cdn.s3-sa-east-1.amazonaws.com/modulo-redux/tenis{id}.jpg"),
            }),
            stock,
        )
    }

    /// Register a raw product record.
    ///
    /// # Panics
    ///
    /// Panics if the record has no integer `id`.
    #[must_use]
    pub fn with_record(self, record: Value, stock: u32) -> Self {
        let id = record["id"]
            .as_i64()
            .and_then(|id| i32::try_from(id).ok())
            .expect("product record needs an integer id");
        {
            let mut state = self.state();
            state.products.insert(id, record);
            state.stock.insert(id, stock);
        }
        self
    }

    pub fn set_stock(&self, id: i32, amount: u32) {
        self.state().stock.insert(id, amount);
    }

    /// Make every request answer with `status` until cleared with `None`.
    pub fn fail_with(&self, status: Option<StatusCode>) {
        self.state().failure = status;
    }

    #[must_use]
    pub fn stock_requests(&self) -> usize {
        self.state().stock_requests
    }

    #[must_use]
    pub fn product_requests(&self) -> usize {
        self.state().product_requests
    }

    fn state(&self) -> MutexGuard<'_, FakeCatalogState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve the catalog on an ephemeral local port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn serve(&self) -> FakeCatalogServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake catalog listener");
        let addr = listener
            .local_addr()
            .expect("Failed to read fake catalog address");

        let app = Router::new()
            .route("/stock/{id}", get(stock))
            .route("/products/{id}", get(product))
            .with_state(self.clone());

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        FakeCatalogServer { addr, handle }
    }
}

/// A running [`FakeCatalog`]. Stops when dropped.
pub struct FakeCatalogServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FakeCatalogServer {
    /// Base URL to point the cart at.
    ///
    /// # Panics
    ///
    /// Never in practice; the address always forms a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("socket address is a valid URL")
    }

    /// Catalog client configuration with the default timeout and caching.
    #[must_use]
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::new(self.base_url())
    }
}

impl Drop for FakeCatalogServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A store as a shopper session would build it, plus its notices.
pub struct Session {
    pub store: CartStore,
    pub notifier: Arc<BufferedNotifier>,
}

impl Session {
    /// Open a session against `catalog` persisting to `storage_path`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn open(catalog: &CatalogConfig, storage_path: &Path) -> Self {
        let notifier = Arc::new(BufferedNotifier::new());
        let store = CartStore::new(
            Arc::new(HttpCatalog::new(catalog).expect("Failed to build catalog client")),
            Arc::new(FileStorage::new(storage_path)),
            notifier.clone(),
            STORAGE_KEY,
        );
        Self { store, notifier }
    }

    /// Messages of every notice so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.notifier
            .notices()
            .into_iter()
            .map(|notice| notice.message)
            .collect()
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn stock(State(catalog): State<FakeCatalog>, UrlPath(id): UrlPath<i32>) -> Response {
    let mut state = catalog.state();
    state.stock_requests += 1;

    if let Some(status) = state.failure {
        return (status, "fake catalog failure").into_response();
    }

    match state.stock.get(&id) {
        Some(amount) => Json(json!({ "amount": amount })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    }
}

async fn product(State(catalog): State<FakeCatalog>, UrlPath(id): UrlPath<i32>) -> Response {
    let mut state = catalog.state();
    state.product_requests += 1;

    if let Some(status) = state.failure {
        return (status, "fake catalog failure").into_response();
    }

    match state.products.get(&id) {
        Some(record) => Json(record.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    }
}
