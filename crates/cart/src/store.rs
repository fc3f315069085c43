//! The cart store.
//!
//! [`CartStore`] owns the shopper's cart. Every mutation runs under a single
//! async mutation lock, held from reading the current snapshot through the
//! catalog lookups to persisting the new snapshot, so concurrent calls apply
//! in arrival order and each one sees the last committed cart. Readers never
//! wait on the catalog: [`CartStore::cart`] returns the last committed
//! snapshot.
//!
//! Each operation comes in two forms:
//! - `try_*` returns a tagged [`CartError`]
//! - the plain form turns any error into exactly one [`Notice`](crate::Notice)
//!   and returns nothing

use std::num::NonZeroU32;
use std::sync::{Arc, PoisonError, RwLock};

use rocketshoes_core::{Cart, ProductId, Stock};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::catalog::{Catalog, CatalogError, HttpCatalog};
use crate::config::CartConfig;
use crate::error::{CartError, Operation};
use crate::notify::Notifier;
use crate::storage::{CartStorage, FileStorage};

/// Request to set a product's amount.
///
/// `amount` is the absolute target, not a delta. Zero and negative targets
/// are ignored; removing a product goes through `remove_product`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductAmount {
    pub product_id: ProductId,
    pub amount: i64,
}

impl UpdateProductAmount {
    #[must_use]
    pub const fn new(product_id: ProductId, amount: i64) -> Self {
        Self { product_id, amount }
    }
}

/// The shopper's cart and its collaborators.
pub struct CartStore {
    catalog: Arc<dyn Catalog>,
    storage: Arc<dyn CartStorage>,
    notifier: Arc<dyn Notifier>,
    storage_key: String,
    cart: RwLock<Cart>,
    mutation: Mutex<()>,
}

impl CartStore {
    /// Create a store, loading the cart persisted under `storage_key`.
    ///
    /// Missing, unreadable or malformed persisted data starts an empty cart.
    pub fn new(
        catalog: Arc<dyn Catalog>,
        storage: Arc<dyn CartStorage>,
        notifier: Arc<dyn Notifier>,
        storage_key: impl Into<String>,
    ) -> Self {
        let storage_key = storage_key.into();
        let cart = load_cart(storage.as_ref(), &storage_key);

        Self {
            catalog,
            storage,
            notifier,
            storage_key,
            cart: RwLock::new(cart),
            mutation: Mutex::new(()),
        }
    }

    /// Create a store backed by the HTTP catalog and file storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(
        config: &CartConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CatalogError> {
        let catalog = HttpCatalog::new(&config.catalog)?;
        let storage = FileStorage::new(&config.storage_path);

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(storage),
            notifier,
            config.storage_key.clone(),
        ))
    }

    /// The last committed cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.cart
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // Notifying operations
    // =========================================================================

    /// Add one of a product, notifying the shopper if it cannot be done.
    pub async fn add_product(&self, product_id: ProductId) {
        if let Err(err) = self.try_add_product(product_id).await {
            self.report(Operation::Add, &err);
        }
    }

    /// Remove a product, notifying the shopper if it is not in the cart.
    pub async fn remove_product(&self, product_id: ProductId) {
        if let Err(err) = self.try_remove_product(product_id).await {
            self.report(Operation::Remove, &err);
        }
    }

    /// Set a product's amount, notifying the shopper if it cannot be done.
    pub async fn update_product_amount(&self, request: UpdateProductAmount) {
        if let Err(err) = self.try_update_product_amount(request).await {
            self.report(Operation::UpdateAmount, &err);
        }
    }

    // =========================================================================
    // Fallible operations
    // =========================================================================

    /// Add one of a product.
    ///
    /// A product already in the cart goes up by one; a new product is fetched
    /// from the catalog and appended with amount 1.
    ///
    /// # Errors
    ///
    /// - `OutOfStock` if the new amount would exceed stock
    /// - `ProductNotFound` / `Lookup` if a catalog lookup fails
    /// - `Storage` / `Encode` if the new cart cannot be persisted
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn try_add_product(&self, product_id: ProductId) -> Result<Cart, CartError> {
        let _guard = self.mutation.lock().await;
        let current = self.cart();

        let stock = self.catalog.stock(product_id).await?;
        let requested = u64::from(current.amount_of(product_id)) + 1;
        let amount = within_stock(product_id, requested, &stock)?;

        let next = if let Some(next) = current.with_amount(product_id, amount) {
            next
        } else {
            let product = self.catalog.product(product_id).await?;
            current.with_product(product, amount)
        };

        self.commit(next)
    }

    /// Remove a product. Local only; no catalog access.
    ///
    /// Still waits for the mutation lock, so a remove issued while an add or
    /// update is mid-lookup waits for that lookup to finish or time out (up
    /// to the catalog timeout) before applying to the cart it committed.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if the product is not in the cart
    /// - `Storage` / `Encode` if the new cart cannot be persisted
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn try_remove_product(&self, product_id: ProductId) -> Result<Cart, CartError> {
        let _guard = self.mutation.lock().await;
        let next = self
            .cart()
            .without(product_id)
            .ok_or(CartError::EntryNotFound(product_id))?;

        self.commit(next)
    }

    /// Set a product's amount to an absolute value.
    ///
    /// Returns `Ok(None)` without touching anything when `amount <= 0`.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if the product is not in the cart
    /// - `OutOfStock` if `amount` exceeds stock
    /// - `ProductNotFound` / `Lookup` if the stock lookup fails
    /// - `Storage` / `Encode` if the new cart cannot be persisted
    #[instrument(
        skip(self, request),
        fields(product_id = %request.product_id, amount = request.amount)
    )]
    pub async fn try_update_product_amount(
        &self,
        request: UpdateProductAmount,
    ) -> Result<Option<Cart>, CartError> {
        let UpdateProductAmount { product_id, amount } = request;
        let Ok(requested) = u64::try_from(amount) else {
            return Ok(None);
        };
        if requested == 0 {
            return Ok(None);
        }

        let _guard = self.mutation.lock().await;
        let current = self.cart();
        if current.get(product_id).is_none() {
            return Err(CartError::EntryNotFound(product_id));
        }

        let stock = self.catalog.stock(product_id).await?;
        let amount = within_stock(product_id, requested, &stock)?;

        let next = current
            .with_amount(product_id, amount)
            .ok_or(CartError::EntryNotFound(product_id))?;

        self.commit(next).map(Some)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Persist `next` in full, then make it the current cart.
    ///
    /// Nothing is committed in memory if the write fails, so memory and
    /// storage never disagree.
    fn commit(&self, next: Cart) -> Result<Cart, CartError> {
        let json = next.to_json()?;
        self.storage.write(&self.storage_key, &json)?;

        *self.cart.write().unwrap_or_else(PoisonError::into_inner) = next.clone();

        info!(
            products = next.len(),
            total_quantity = next.total_quantity(),
            "Cart updated"
        );
        Ok(next)
    }

    fn report(&self, operation: Operation, err: &CartError) {
        if err.is_out_of_stock() {
            info!(operation = %operation, reason = %err, "Cart change rejected");
        } else {
            warn!(operation = %operation, error = %err, "Cart change failed");
        }
        self.notifier.notify(err.notice(operation));
    }
}

/// Check a requested amount against stock.
fn within_stock(
    product_id: ProductId,
    requested: u64,
    stock: &Stock,
) -> Result<NonZeroU32, CartError> {
    let out_of_stock = || CartError::OutOfStock {
        product_id,
        requested,
        available: stock.amount,
    };

    if requested > u64::from(stock.amount) {
        return Err(out_of_stock());
    }

    u32::try_from(requested)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(out_of_stock)
}

/// Read the persisted cart, falling back to an empty one.
fn load_cart(storage: &dyn CartStorage, key: &str) -> Cart {
    match storage.read(key) {
        Ok(Some(json)) => Cart::from_json(&json).unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "Discarding malformed persisted cart");
            Cart::new()
        }),
        Ok(None) => Cart::new(),
        Err(e) => {
            warn!(key = %key, error = %e, "Could not read persisted cart");
            Cart::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use mockall::predicate::eq;
    use rocketshoes_core::Product;

    use super::*;
    use crate::catalog::MockCatalog;
    use crate::error::{
        ADD_FAILED_MESSAGE, OUT_OF_STOCK_MESSAGE, REMOVE_FAILED_MESSAGE, UPDATE_FAILED_MESSAGE,
    };
    use crate::notify::BufferedNotifier;
    use crate::storage::{MemoryStorage, StorageError};

    const KEY: &str = "@RocketShoes:cart";

    fn product(id: i32) -> Product {
        Product::new(ProductId::new(id))
            .with("title", format!("Tênis {id}"))
            .with("price", "179.9")
            .with("image", format!("https://cdn.rocketshoes.test/{id}.jpg"))
    }

    fn amount(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    fn cart_of(entries: &[(i32, u32)]) -> Cart {
        entries
            .iter()
            .fold(Cart::new(), |cart, &(id, n)| cart.with_product(product(id), amount(n)))
    }

    fn ids(cart: &Cart) -> Vec<i32> {
        cart.entries().iter().map(|e| e.product_id().as_i32()).collect()
    }

    /// Catalog where every product exists with the given stock.
    fn catalog_with_stock(available: u32) -> MockCatalog {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_stock()
            .returning(move |id| Ok(Stock { id, amount: available }));
        catalog.expect_product().returning(|id| Ok(product(id.as_i32())));
        catalog
    }

    struct Harness {
        store: CartStore,
        storage: Arc<MemoryStorage>,
        notifier: Arc<BufferedNotifier>,
    }

    impl Harness {
        fn new(catalog: impl Catalog + 'static, initial: &Cart) -> Self {
            let storage = Arc::new(MemoryStorage::with_value(KEY, &initial.to_json().unwrap()));
            Self::with_storage(catalog, storage)
        }

        fn with_storage(catalog: impl Catalog + 'static, storage: Arc<MemoryStorage>) -> Self {
            let notifier = Arc::new(BufferedNotifier::new());
            let store = CartStore::new(Arc::new(catalog), storage.clone(), notifier.clone(), KEY);
            Self {
                store,
                storage,
                notifier,
            }
        }

        fn persisted(&self) -> Option<String> {
            self.storage.read(KEY).unwrap()
        }

        fn messages(&self) -> Vec<String> {
            self.notifier.notices().into_iter().map(|n| n.message).collect()
        }

        fn assert_persisted_matches_memory(&self) {
            let persisted = Cart::from_json(&self.persisted().unwrap()).unwrap();
            assert_eq!(persisted, self.store.cart());
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn test_loads_persisted_cart() {
        let initial = cart_of(&[(1, 2), (2, 1)]);
        let harness = Harness::new(MockCatalog::new(), &initial);
        assert_eq!(harness.store.cart(), initial);
    }

    #[test]
    fn test_starts_empty_without_persisted_cart() {
        let harness = Harness::with_storage(MockCatalog::new(), Arc::new(MemoryStorage::new()));
        assert!(harness.store.cart().is_empty());
    }

    #[test]
    fn test_starts_empty_on_malformed_persisted_cart() {
        for garbage in ["not json", "{}", r#"[{"id":1}]"#, "null"] {
            let storage = Arc::new(MemoryStorage::with_value(KEY, garbage));
            let harness = Harness::with_storage(MockCatalog::new(), storage);
            assert!(harness.store.cart().is_empty(), "input: {garbage}");
        }
    }

    // =========================================================================
    // add_product
    // =========================================================================

    #[tokio::test]
    async fn test_add_new_product_creates_entry_with_amount_one() {
        let harness = Harness::new(catalog_with_stock(3), &Cart::new());

        harness.store.add_product(ProductId::new(1)).await;

        let cart = harness.store.cart();
        assert_eq!(ids(&cart), vec![1]);
        assert_eq!(cart.amount_of(ProductId::new(1)), 1);
        assert!(harness.messages().is_empty());
        harness.assert_persisted_matches_memory();
    }

    #[tokio::test]
    async fn test_add_existing_product_increments_without_duplicate() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_stock()
            .with(eq(ProductId::new(2)))
            .times(1)
            .returning(|id| Ok(Stock { id, amount: 3 }));
        catalog.expect_product().never();

        let harness = Harness::new(catalog, &cart_of(&[(1, 1), (2, 2)]));
        harness.store.add_product(ProductId::new(2)).await;

        let cart = harness.store.cart();
        assert_eq!(ids(&cart), vec![1, 2]);
        assert_eq!(cart.amount_of(ProductId::new(2)), 3);
        harness.assert_persisted_matches_memory();
    }

    #[tokio::test]
    async fn test_add_beyond_stock_is_rejected() {
        let initial = cart_of(&[(1, 2)]);
        let harness = Harness::new(catalog_with_stock(2), &initial);
        let persisted_before = harness.persisted();

        harness.store.add_product(ProductId::new(1)).await;

        assert_eq!(harness.store.cart(), initial);
        assert_eq!(harness.persisted(), persisted_before);
        assert_eq!(harness.messages(), vec![OUT_OF_STOCK_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_add_new_product_with_zero_stock_skips_metadata_fetch() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_stock()
            .returning(|id| Ok(Stock { id, amount: 0 }));
        catalog.expect_product().never();

        let harness = Harness::new(catalog, &Cart::new());
        let err = harness.store.try_add_product(ProductId::new(5)).await.unwrap_err();

        assert!(matches!(
            err,
            CartError::OutOfStock { requested: 1, available: 0, .. }
        ));
        assert!(harness.store.cart().is_empty());
    }

    #[tokio::test]
    async fn test_add_unknown_product_notifies_failure() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_stock()
            .returning(|id| Err(CatalogError::NotFound(id)));

        let harness = Harness::new(catalog, &Cart::new());
        let err = harness.store.try_add_product(ProductId::new(99)).await.unwrap_err();
        assert!(matches!(err, CartError::ProductNotFound(_)));

        harness.store.add_product(ProductId::new(99)).await;
        assert!(harness.store.cart().is_empty());
        assert_eq!(harness.messages(), vec![ADD_FAILED_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_add_metadata_failure_leaves_cart_unchanged() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_stock()
            .returning(|id| Ok(Stock { id, amount: 5 }));
        catalog.expect_product().returning(|_| {
            Err(CatalogError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        });

        let initial = cart_of(&[(1, 1)]);
        let harness = Harness::new(catalog, &initial);
        harness.store.add_product(ProductId::new(2)).await;

        assert_eq!(harness.store.cart(), initial);
        assert_eq!(harness.messages(), vec![ADD_FAILED_MESSAGE.to_string()]);
    }

    // =========================================================================
    // remove_product
    // =========================================================================

    #[tokio::test]
    async fn test_remove_deletes_only_that_entry() {
        let mut catalog = MockCatalog::new();
        catalog.expect_stock().never();
        catalog.expect_product().never();

        let harness = Harness::new(catalog, &cart_of(&[(1, 1), (2, 3), (3, 2)]));
        harness.store.remove_product(ProductId::new(2)).await;

        let cart = harness.store.cart();
        assert_eq!(ids(&cart), vec![1, 3]);
        assert_eq!(cart.amount_of(ProductId::new(3)), 2);
        assert!(harness.messages().is_empty());
        harness.assert_persisted_matches_memory();
    }

    #[tokio::test]
    async fn test_remove_absent_product_notifies_failure() {
        let initial = cart_of(&[(1, 1)]);
        let harness = Harness::new(MockCatalog::new(), &initial);

        let err = harness.store.try_remove_product(ProductId::new(7)).await.unwrap_err();
        assert!(matches!(err, CartError::EntryNotFound(_)));

        harness.store.remove_product(ProductId::new(7)).await;
        assert_eq!(harness.store.cart(), initial);
        assert_eq!(harness.messages(), vec![REMOVE_FAILED_MESSAGE.to_string()]);
    }

    // =========================================================================
    // update_product_amount
    // =========================================================================

    #[tokio::test]
    async fn test_update_non_positive_amount_is_silent_noop() {
        let mut catalog = MockCatalog::new();
        catalog.expect_stock().never();

        let initial = cart_of(&[(1, 2)]);
        let harness = Harness::new(catalog, &initial);
        let persisted_before = harness.persisted();

        for amount in [0, -1, i64::MIN] {
            let result = harness
                .store
                .try_update_product_amount(UpdateProductAmount::new(ProductId::new(1), amount))
                .await
                .unwrap();
            assert!(result.is_none());
            harness
                .store
                .update_product_amount(UpdateProductAmount::new(ProductId::new(1), amount))
                .await;
        }

        assert_eq!(harness.store.cart(), initial);
        assert_eq!(harness.persisted(), persisted_before);
        assert!(harness.messages().is_empty());
    }

    #[tokio::test]
    async fn test_update_sets_absolute_amount_then_rejects_beyond_stock() {
        let harness = Harness::new(catalog_with_stock(5), &cart_of(&[(1, 2)]));

        harness
            .store
            .update_product_amount(UpdateProductAmount::new(ProductId::new(1), 5))
            .await;
        assert_eq!(harness.store.cart().amount_of(ProductId::new(1)), 5);
        assert!(harness.messages().is_empty());
        harness.assert_persisted_matches_memory();

        harness
            .store
            .update_product_amount(UpdateProductAmount::new(ProductId::new(1), 6))
            .await;
        assert_eq!(harness.store.cart().amount_of(ProductId::new(1)), 5);
        assert_eq!(harness.messages(), vec![OUT_OF_STOCK_MESSAGE.to_string()]);
        harness.assert_persisted_matches_memory();
    }

    #[tokio::test]
    async fn test_update_can_lower_amount() {
        let harness = Harness::new(catalog_with_stock(10), &cart_of(&[(1, 4), (2, 1)]));

        let cart = harness
            .store
            .try_update_product_amount(UpdateProductAmount::new(ProductId::new(1), 1))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ids(&cart), vec![1, 2]);
        assert_eq!(cart.amount_of(ProductId::new(1)), 1);
    }

    #[tokio::test]
    async fn test_update_absent_product_fails_without_lookup() {
        let mut catalog = MockCatalog::new();
        catalog.expect_stock().never();

        let harness = Harness::new(catalog, &cart_of(&[(1, 1)]));
        harness
            .store
            .update_product_amount(UpdateProductAmount::new(ProductId::new(2), 1))
            .await;

        assert_eq!(harness.messages(), vec![UPDATE_FAILED_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_update_lookup_failure_notifies_failure() {
        let mut catalog = MockCatalog::new();
        catalog.expect_stock().returning(|_| {
            Err(CatalogError::InvalidBaseUrl("mailto:nobody".to_string()))
        });

        let initial = cart_of(&[(1, 1)]);
        let harness = Harness::new(catalog, &initial);
        let err = harness
            .store
            .try_update_product_amount(UpdateProductAmount::new(ProductId::new(1), 2))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Lookup(_)));

        harness
            .store
            .update_product_amount(UpdateProductAmount::new(ProductId::new(1), 2))
            .await;
        assert_eq!(harness.store.cart(), initial);
        assert_eq!(harness.messages(), vec![UPDATE_FAILED_MESSAGE.to_string()]);
    }

    #[test]
    fn test_update_request_deserializes_from_camel_case() {
        let request: UpdateProductAmount =
            serde_json::from_str(r#"{"productId":3,"amount":-2}"#).unwrap();
        assert_eq!(request, UpdateProductAmount::new(ProductId::new(3), -2));
    }

    // =========================================================================
    // Persistence failures
    // =========================================================================

    struct FailingStorage;

    impl CartStorage for FailingStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: "/readonly/storage.json".into(),
                source: std::io::Error::other("read-only file system"),
            })
        }
    }

    #[tokio::test]
    async fn test_failed_write_does_not_commit() {
        let notifier = Arc::new(BufferedNotifier::new());
        let store = CartStore::new(
            Arc::new(catalog_with_stock(5)),
            Arc::new(FailingStorage),
            notifier.clone(),
            KEY,
        );

        let err = store.try_add_product(ProductId::new(1)).await.unwrap_err();
        assert!(matches!(err, CartError::Storage(_)));
        assert!(store.cart().is_empty());

        store.add_product(ProductId::new(1)).await;
        assert_eq!(notifier.notices().len(), 1);
    }

    // =========================================================================
    // Concurrency
    // =========================================================================

    /// Catalog whose lookups suspend, so overlapping calls interleave.
    struct SlowCatalog {
        available: u32,
    }

    #[async_trait]
    impl Catalog for SlowCatalog {
        async fn stock(&self, product_id: ProductId) -> Result<Stock, CatalogError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(Stock {
                id: product_id,
                amount: self.available,
            })
        }

        async fn product(&self, product_id: ProductId) -> Result<Product, CatalogError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(product(product_id.as_i32()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_adds_apply_in_order() {
        let harness = Harness::new(SlowCatalog { available: 5 }, &Cart::new());
        let id = ProductId::new(1);

        tokio::join!(
            harness.store.add_product(id),
            harness.store.add_product(id),
            harness.store.add_product(id),
        );

        let cart = harness.store.cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.amount_of(id), 3);
        harness.assert_persisted_matches_memory();
    }

    #[tokio::test]
    async fn test_concurrent_add_and_update_do_not_clobber() {
        let harness = Harness::new(SlowCatalog { available: 10 }, &cart_of(&[(1, 1)]));

        tokio::join!(
            harness
                .store
                .update_product_amount(UpdateProductAmount::new(ProductId::new(1), 4)),
            harness.store.add_product(ProductId::new(2)),
        );

        let cart = harness.store.cart();
        assert_eq!(cart.amount_of(ProductId::new(1)), 4);
        assert_eq!(cart.amount_of(ProductId::new(2)), 1);
        harness.assert_persisted_matches_memory();
    }

    #[tokio::test]
    async fn test_remove_waits_for_in_flight_add() {
        let harness = Harness::new(SlowCatalog { available: 5 }, &Cart::new());
        let id = ProductId::new(1);

        // the add holds the lock across its lookups; the remove applies to
        // the cart the add committed
        tokio::join!(harness.store.add_product(id), harness.store.remove_product(id));

        assert!(harness.store.cart().is_empty());
        assert!(harness.messages().is_empty());
        harness.assert_persisted_matches_memory();
    }
}
