//! RocketShoes cart library.
//!
//! Owns the shopper's cart: every change is checked against live stock from
//! the catalog service and the full cart is persisted after each successful
//! change.
//!
//! # Architecture
//!
//! - [`CartStore`] - The cart and its three mutating operations
//! - [`catalog`] - Product/stock lookups (`HttpCatalog` over `reqwest`)
//! - [`storage`] - Key-value persistence (file-backed or in-memory)
//! - [`notify`] - User-facing notices for rejected or failed operations
//! - [`view`] - Formatted display data for a cart
//!
//! # Example
//!
//! ```rust,ignore
//! use rocketshoes_cart::{CartConfig, CartStore, TracingNotifier};
//!
//! let config = CartConfig::from_env()?;
//! let store = CartStore::from_config(&config, Arc::new(TracingNotifier))?;
//!
//! store.add_product(ProductId::new(1)).await;
//! store.update_product_amount(UpdateProductAmount::new(ProductId::new(1), 3)).await;
//! let cart = store.cart();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod storage;
pub mod store;
pub mod view;

pub use catalog::{Catalog, CatalogError, HttpCatalog};
pub use config::{CartConfig, CatalogConfig, ConfigError};
pub use error::{CartError, Operation};
pub use notify::{BufferedNotifier, Notice, Notifier, TracingNotifier};
pub use storage::{CartStorage, FileStorage, MemoryStorage, StorageError};
pub use store::{CartStore, UpdateProductAmount};
pub use view::{CartItemView, CartView};
