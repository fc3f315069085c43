//! Cart session commands.

use std::fmt::Write as _;
use std::sync::Arc;

use rocketshoes_cart::{
    BufferedNotifier, CartConfig, CartStore, CartView, CatalogError, ConfigError, Notice,
    UpdateProductAmount,
};
use rocketshoes_core::ProductId;
use thiserror::Error;

/// Errors that stop a session before any command runs.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog client error: {0}")]
    Catalog(#[from] CatalogError),
}

/// One shopper session: a store loaded from the configured storage and the
/// notices it produced.
pub struct Session {
    store: CartStore,
    notifier: Arc<BufferedNotifier>,
}

impl Session {
    /// Open a session from environment configuration.
    pub fn open() -> Result<Self, CliError> {
        let config = CartConfig::from_env()?;
        tracing::debug!(
            api = %config.catalog.base_url,
            storage = %config.storage_path.display(),
            "Opening cart session"
        );

        let notifier = Arc::new(BufferedNotifier::new());
        let store = CartStore::from_config(&config, notifier.clone())?;
        Ok(Self { store, notifier })
    }

    pub async fn add(&self, product_id: ProductId) {
        self.store.add_product(product_id).await;
    }

    pub async fn remove(&self, product_id: ProductId) {
        self.store.remove_product(product_id).await;
    }

    pub async fn set(&self, product_id: ProductId, amount: i64) {
        self.store
            .update_product_amount(UpdateProductAmount::new(product_id, amount))
            .await;
    }

    /// Print the cart followed by any notices.
    #[allow(clippy::print_stdout)]
    pub fn print(&self) {
        let view = CartView::from(&self.store.cart());
        print!("{}", render(&view, &self.notifier.drain()));
    }
}

/// Render a cart and notices as terminal text.
fn render(view: &CartView, notices: &[Notice]) -> String {
    let mut out = String::new();

    if view.items.is_empty() {
        out.push_str("Cart is empty\n");
    } else {
        for item in &view.items {
            let _ = writeln!(
                out,
                "#{:<4} {:<40} {:>3} x {:>10} = {:>10}",
                item.product_id, item.title, item.amount, item.price, item.subtotal
            );
        }
        let _ = writeln!(
            out,
            "{} item(s), {} pair(s), total {}",
            view.item_count, view.total_quantity, view.total
        );
    }

    for notice in notices {
        let _ = writeln!(out, "! {}", notice.message);
    }

    out
}
