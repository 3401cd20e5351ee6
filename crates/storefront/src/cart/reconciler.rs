//! Cart reconciler.
//!
//! Decides per operation whether the server cart or the guest cart is
//! authoritative, falls back to the guest cart when the server is
//! unreachable, and merges the guest cart into the server cart once per
//! login.

use std::future::Future;
use std::sync::Arc;

use gosporty_core::{AddItemPayload, Cart, LineKey};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::watch;
use tracing::instrument;

use super::local::LocalCartStore;
use super::queue::OperationQueue;
use super::state::{CartSnapshot, CartSource};
use crate::api::{ApiError, RemoteCart};
use crate::error::{add_breadcrumb, clear_sentry_user, Result};
use crate::session::SessionContext;
use crate::storage::StorageError;

/// Outcome of merging the guest cart into the server cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Guest lines sent to the server.
    pub attempted: usize,
    /// Guest lines the server accepted.
    pub synced: usize,
    /// Guest lines the server rejected. These are gone from the guest cart.
    pub failed: Vec<LineKey>,
    /// Whether the server cart was fetched and adopted afterwards.
    pub fetched: bool,
}

impl SyncReport {
    /// Returns `true` if every guest line reached the server.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the observable cart and every path that changes it.
pub struct CartReconciler {
    session: Arc<SessionContext>,
    local: LocalCartStore,
    remote: Arc<dyn RemoteCart>,
    state: watch::Sender<CartSnapshot>,
    queue: OperationQueue,
}

impl CartReconciler {
    /// Create a reconciler with an empty snapshot. Call [`Self::init`] to
    /// load the real cart.
    #[must_use]
    pub fn new(
        session: Arc<SessionContext>,
        local: LocalCartStore,
        remote: Arc<dyn RemoteCart>,
    ) -> Self {
        let (state, _) = watch::channel(CartSnapshot::default());
        Self {
            session,
            local,
            remote,
            state,
            queue: OperationQueue::new(),
        }
    }

    /// The session this reconciler checks before each operation.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// Receive every snapshot published from now on.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.state.subscribe()
    }

    /// The current snapshot. Does not wait for queued operations.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.state.borrow().total_item_count()
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.state.borrow().subtotal()
    }

    /// Whether the initial server fetch is still in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Load the cart for the current session.
    ///
    /// Signed in, the server cart is adopted, or the guest cart if the
    /// server is unreachable. The guest cart is not overwritten either way.
    #[instrument(skip(self))]
    pub async fn init(&self) -> CartSnapshot {
        let _turn = self.queue.enter("init").await;
        self.refresh_locked().await
    }

    /// Merge the guest cart into the server cart.
    ///
    /// Each guest line is added to the server independently. The guest cart
    /// is then cleared whether or not every line made it, and the server
    /// cart is adopted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the guest cart cannot be cleared.
    #[instrument(skip(self))]
    pub async fn sync_on_login(&self) -> Result<SyncReport> {
        let _turn = self.queue.enter("sync_on_login").await;
        self.sync_locked().await
    }

    /// Start a session with `token` and merge the guest cart into it.
    ///
    /// The sync runs in the same queue turn as the token install, so no
    /// other cart operation can slip in between.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted or the guest cart
    /// cannot be cleared. The session is active in memory either way.
    #[instrument(skip(self, token))]
    pub async fn login(&self, token: SecretString) -> Result<SyncReport> {
        let _turn = self.queue.enter("login").await;
        self.session.set_token(token)?;
        tracing::info!("Session started");

        let report = self.sync_locked().await?;
        if report.attempted == 0 {
            self.refresh_locked().await;
        }
        Ok(report)
    }

    /// End the session and show the guest cart again.
    ///
    /// No cart data moves: the server cart stays on the server and the
    /// guest cart is whatever was persisted locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted token cannot be removed.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<CartSnapshot> {
        let _turn = self.queue.enter("logout").await;
        self.session.clear()?;
        clear_sentry_user();
        tracing::info!("Session ended");
        Ok(self.publish(self.local.load(), CartSource::Local))
    }

    /// Add a line, or increase the quantity of a matching one.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload has no product id or the guest cart
    /// cannot be written.
    #[instrument(skip(self, payload))]
    pub async fn add_item(&self, payload: &AddItemPayload) -> Result<Cart> {
        let item = payload.normalize()?;
        let _turn = self.queue.enter("add_item").await;
        self.mutate(
            "add_item",
            self.remote.add_item(&item),
            |local| local.add(item.clone()),
        )
        .await
    }

    /// Set a line's quantity. Anything below one removes the line.
    ///
    /// Signed in, zero is still sent as an update; the server drops the
    /// line itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the guest cart cannot be written.
    #[instrument(skip(self, line), fields(product_id = %line.product_id))]
    pub async fn update_quantity(&self, line: &LineKey, quantity: u32) -> Result<Cart> {
        let _turn = self.queue.enter("update_quantity").await;
        self.mutate(
            "update_quantity",
            self.remote.update_quantity(line, quantity),
            |local| local.update_quantity(line, quantity),
        )
        .await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the guest cart cannot be written.
    #[instrument(skip(self, line), fields(product_id = %line.product_id))]
    pub async fn remove_item(&self, line: &LineKey) -> Result<Cart> {
        let _turn = self.queue.enter("remove_item").await;
        self.mutate(
            "remove_item",
            self.remote.remove_item(line),
            |local| local.remove(line),
        )
        .await
    }

    /// Empty the cart.
    ///
    /// The guest cart is always emptied. Signed in, the server cart is
    /// cleared too; a failure there is only logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the guest cart cannot be written.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Cart> {
        let _turn = self.queue.enter("clear_cart").await;
        let cart = self.local.empty()?;

        let source = if self.session.is_authenticated() {
            match self.remote.clear_cart().await {
                Ok(()) => CartSource::Remote,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to clear server cart");
                    add_breadcrumb("cart", "Server cart clear failed", Some(&[("operation", "clear_cart")]));
                    CartSource::LocalFallback
                }
            }
        } else {
            CartSource::Local
        };

        Ok(self.publish(cart, source).cart)
    }

    /// Replace the observable cart without touching either store.
    #[instrument(skip(self, cart), fields(lines = cart.items.len()))]
    pub async fn set_cart(&self, cart: Cart) -> CartSnapshot {
        let _turn = self.queue.enter("set_cart").await;
        let source = self.state.borrow().source;
        self.publish(cart, source)
    }

    /// Run a mutation against the server, or the guest cart when signed out
    /// or when the server call fails.
    async fn mutate<R, L>(&self, operation: &'static str, remote: R, local: L) -> Result<Cart>
    where
        R: Future<Output = std::result::Result<Cart, ApiError>>,
        L: FnOnce(&LocalCartStore) -> std::result::Result<Cart, StorageError>,
    {
        if !self.session.is_authenticated() {
            let cart = local(&self.local)?;
            return Ok(self.publish(cart, CartSource::Local).cart);
        }

        match remote.await {
            Ok(cart) => Ok(self.publish(cart, CartSource::Remote).cart),
            Err(e) => {
                tracing::warn!(
                    operation,
                    status = ?e.status(),
                    error = %e,
                    "Server cart unavailable, using local cart"
                );
                add_breadcrumb("cart", "Fell back to local cart", Some(&[("operation", operation)]));
                let cart = local(&self.local)?;
                Ok(self.publish(cart, CartSource::LocalFallback).cart)
            }
        }
    }

    async fn refresh_locked(&self) -> CartSnapshot {
        if !self.session.is_authenticated() {
            return self.publish(self.local.load(), CartSource::Local);
        }

        self.state.send_modify(|snapshot| snapshot.loading = true);
        match self.remote.fetch_cart().await {
            Ok(cart) => self.publish(cart, CartSource::Remote),
            Err(e) => {
                tracing::warn!(
                    status = ?e.status(),
                    error = %e,
                    "Failed to fetch server cart, showing local cart"
                );
                self.publish(self.local.load(), CartSource::LocalFallback)
            }
        }
    }

    async fn sync_locked(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        if !self.session.is_authenticated() {
            tracing::debug!("No session, skipping cart sync");
            return Ok(report);
        }

        let guest = self.local.load();
        if guest.is_empty() {
            tracing::debug!("Guest cart empty, nothing to sync");
            return Ok(report);
        }

        for item in &guest.items {
            report.attempted += 1;
            match self.remote.add_item(item).await {
                Ok(_) => report.synced += 1,
                Err(e) => {
                    tracing::error!(
                        product_id = %item.product_id,
                        error = %e,
                        "Failed to sync guest cart line"
                    );
                    report.failed.push(item.line_key());
                }
            }
        }

        self.local.clear()?;

        match self.remote.fetch_cart().await {
            Ok(cart) => {
                self.publish(cart, CartSource::Remote);
                report.fetched = true;
            }
            Err(e) => tracing::error!(error = %e, "Failed to fetch server cart after sync"),
        }

        tracing::info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed.len(),
            "Guest cart synced"
        );
        Ok(report)
    }

    fn publish(&self, cart: Cart, source: CartSource) -> CartSnapshot {
        let snapshot = CartSnapshot::new(cart, source);
        tracing::debug!(
            source = ?source,
            items = snapshot.total_item_count(),
            "Cart updated"
        );
        self.state.send_replace(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use gosporty_core::{CartItem, Price};
    use secrecy::ExposeSecret;

    use super::*;
    use crate::session::keys;
    use crate::storage::{KeyValueStore, MemoryStore};

    /// In-process stand-in for the backend cart endpoints.
    #[derive(Default)]
    struct FakeRemote {
        cart: Mutex<Cart>,
        offline: AtomicBool,
        rejected: Mutex<Vec<String>>,
        adds: AtomicUsize,
        fetches: AtomicUsize,
        updates: AtomicUsize,
        removes: AtomicUsize,
        clears: AtomicUsize,
    }

    impl FakeRemote {
        fn with_cart(cart: Cart) -> Arc<Self> {
            Arc::new(Self {
                cart: Mutex::new(cart),
                ..Self::default()
            })
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn reject(&self, product: &str) {
            self.rejected.lock().unwrap().push(product.to_owned());
        }

        fn check(&self) -> std::result::Result<(), ApiError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(ApiError::Api {
                    status: 503,
                    message: "unavailable".to_owned(),
                });
            }
            Ok(())
        }

        fn server_cart(&self) -> Cart {
            self.cart.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteCart for FakeRemote {
        async fn fetch_cart(&self) -> std::result::Result<Cart, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(self.server_cart())
        }

        async fn add_item(&self, item: &CartItem) -> std::result::Result<Cart, ApiError> {
            self.adds.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            if self
                .rejected
                .lock()
                .unwrap()
                .contains(&item.product_id.to_string())
            {
                return Err(ApiError::Api {
                    status: 404,
                    message: "Product not found".to_owned(),
                });
            }
            // Read, yield, write: loses updates unless callers are serialized.
            let mut cart = self.server_cart();
            tokio::task::yield_now().await;
            cart.add_item(item.clone());
            *self.cart.lock().unwrap() = cart.clone();
            Ok(cart)
        }

        async fn update_quantity(
            &self,
            line: &LineKey,
            quantity: u32,
        ) -> std::result::Result<Cart, ApiError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            let mut cart = self.cart.lock().unwrap();
            if cart.find(line).is_none() {
                return Err(ApiError::Api {
                    status: 404,
                    message: "Item not found in cart".to_owned(),
                });
            }
            cart.set_quantity(line, quantity);
            Ok(cart.clone())
        }

        async fn remove_item(&self, line: &LineKey) -> std::result::Result<Cart, ApiError> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            let mut cart = self.cart.lock().unwrap();
            cart.remove(line);
            Ok(cart.clone())
        }

        async fn clear_cart(&self) -> std::result::Result<(), ApiError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.cart.lock().unwrap().clear();
            Ok(())
        }
    }

    /// Backend whose cart fetch hangs until released.
    #[derive(Default)]
    struct SlowRemote {
        release: Notify,
    }

    #[async_trait]
    impl RemoteCart for SlowRemote {
        async fn fetch_cart(&self) -> std::result::Result<Cart, ApiError> {
            self.release.notified().await;
            Ok(Cart::with_items(vec![server_item("S", 2)]))
        }

        async fn add_item(&self, _item: &CartItem) -> std::result::Result<Cart, ApiError> {
            Ok(Cart::empty())
        }

        async fn update_quantity(
            &self,
            _line: &LineKey,
            _quantity: u32,
        ) -> std::result::Result<Cart, ApiError> {
            Ok(Cart::empty())
        }

        async fn remove_item(&self, _line: &LineKey) -> std::result::Result<Cart, ApiError> {
            Ok(Cart::empty())
        }

        async fn clear_cart(&self) -> std::result::Result<(), ApiError> {
            Ok(())
        }
    }

    struct Harness {
        store: MemoryStore,
        remote: Arc<FakeRemote>,
        reconciler: Arc<CartReconciler>,
    }

    fn harness(token: Option<&str>, server: Cart) -> Harness {
        let store = MemoryStore::new();
        if let Some(token) = token {
            store.set(keys::TOKEN, token).unwrap();
        }
        let session = Arc::new(SessionContext::restore(Arc::new(store.clone())));
        let remote = FakeRemote::with_cart(server);
        let reconciler = Arc::new(CartReconciler::new(
            session,
            LocalCartStore::new(Arc::new(store.clone())),
            Arc::clone(&remote) as Arc<dyn RemoteCart>,
        ));
        Harness {
            store,
            remote,
            reconciler,
        }
    }

    fn payload(product: &str, color: &str, qty: u32) -> AddItemPayload {
        AddItemPayload::new(product)
            .with_color(color)
            .with_size("M")
            .with_quantity(qty)
            .with_price(Price::from(100_u32))
    }

    fn line(product: &str, color: &str) -> LineKey {
        LineKey::new(product, Some(color), Some("M"))
    }

    fn server_item(product: &str, qty: u32) -> CartItem {
        payload(product, "Red", qty).normalize().unwrap()
    }

    #[tokio::test]
    async fn test_guest_add_merges_same_line() {
        let h = harness(None, Cart::empty());
        h.reconciler.add_item(&payload("A", "Red", 2)).await.unwrap();
        let cart = h.reconciler.add_item(&payload("A", "Red", 1)).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(h.remote.adds.load(Ordering::SeqCst), 0);
        assert_eq!(h.reconciler.snapshot().source, CartSource::Local);
    }

    #[tokio::test]
    async fn test_guest_add_distinct_color_is_new_line() {
        let h = harness(None, Cart::empty());
        h.reconciler.add_item(&payload("A", "Red", 3)).await.unwrap();
        let cart = h.reconciler.add_item(&payload("A", "Blue", 1)).await.unwrap();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(h.reconciler.total_item_count(), 4);
        assert_eq!(h.reconciler.subtotal(), Decimal::from(400));
    }

    #[tokio::test]
    async fn test_update_below_one_removes_line() {
        let h = harness(None, Cart::empty());
        h.reconciler.add_item(&payload("A", "Red", 2)).await.unwrap();
        h.reconciler.add_item(&payload("B", "Red", 1)).await.unwrap();

        let cart = h
            .reconciler
            .update_quantity(&line("A", "Red"), 0)
            .await
            .unwrap();

        assert_eq!(cart.items.len(), 1);
        assert!(cart.find(&line("A", "Red")).is_none());
    }

    #[tokio::test]
    async fn test_update_missing_line_is_noop() {
        let h = harness(None, Cart::empty());
        h.reconciler.add_item(&payload("A", "Red", 2)).await.unwrap();

        let cart = h
            .reconciler
            .update_quantity(&line("Z", "Red"), 5)
            .await
            .unwrap();

        assert_eq!(cart.total_item_count(), 2);
    }

    #[tokio::test]
    async fn test_add_without_product_id_is_rejected() {
        let h = harness(None, Cart::empty());
        let err = h
            .reconciler
            .add_item(&AddItemPayload::default())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::error::CartError::Payload(_)));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_init_guest_with_invalid_json_is_empty() {
        let h = harness(None, Cart::empty());
        h.store.set(keys::CART, "{{{").unwrap();

        let snapshot = h.reconciler.init().await;

        assert!(snapshot.cart.is_empty());
        assert_eq!(snapshot.source, CartSource::Local);
    }

    #[tokio::test]
    async fn test_init_signed_in_adopts_server_cart() {
        let h = harness(Some("jwt"), Cart::with_items(vec![server_item("S", 2)]));
        let mut rx = h.reconciler.subscribe();

        let snapshot = h.reconciler.init().await;

        assert_eq!(snapshot.source, CartSource::Remote);
        assert_eq!(snapshot.total_item_count(), 2);
        assert!(!h.reconciler.is_loading());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().total_item_count(), 2);
    }

    #[tokio::test]
    async fn test_init_signed_in_offline_shows_local_without_overwriting() {
        let h = harness(Some("jwt"), Cart::empty());
        h.store
            .set(keys::CART, r#"{"items":[{"productId":"L","qty":1}]}"#)
            .unwrap();
        h.remote.set_offline(true);

        let snapshot = h.reconciler.init().await;

        assert_eq!(snapshot.source, CartSource::LocalFallback);
        assert_eq!(snapshot.total_item_count(), 1);
        assert!(!snapshot.loading);
        assert_eq!(
            h.store.get(keys::CART).unwrap().as_deref(),
            Some(r#"{"items":[{"productId":"L","qty":1}]}"#)
        );
    }

    #[tokio::test]
    async fn test_login_with_empty_guest_cart_makes_no_adds() {
        let h = harness(None, Cart::with_items(vec![server_item("S", 1)]));
        h.store.set(keys::CART, r#"{"items":[]}"#).unwrap();

        let report = h.reconciler.login(SecretString::from("jwt")).await.unwrap();

        assert_eq!(report, SyncReport::default());
        assert_eq!(h.remote.adds.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.store.get(keys::CART).unwrap().as_deref(),
            Some(r#"{"items":[]}"#)
        );
        // The server cart is still shown after login.
        assert_eq!(h.reconciler.snapshot().source, CartSource::Remote);
        assert_eq!(h.reconciler.total_item_count(), 1);
    }

    #[tokio::test]
    async fn test_login_syncs_then_clears_guest_cart() {
        let h = harness(None, Cart::with_items(vec![server_item("S", 1)]));
        h.reconciler.add_item(&payload("A", "Red", 2)).await.unwrap();
        h.reconciler.add_item(&payload("B", "Red", 1)).await.unwrap();

        let report = h.reconciler.login(SecretString::from("jwt")).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.synced, 2);
        assert!(report.is_complete());
        assert!(report.fetched);
        assert_eq!(h.store.get(keys::CART).unwrap(), None);
        assert_eq!(h.store.get(keys::TOKEN).unwrap().as_deref(), Some("jwt"));

        let snapshot = h.reconciler.snapshot();
        assert_eq!(snapshot.cart, h.remote.server_cart());
        assert_eq!(snapshot.source, CartSource::Remote);
        assert_eq!(snapshot.total_item_count(), 4);
    }

    #[tokio::test]
    async fn test_partial_sync_failure_still_clears_guest_cart() {
        let h = harness(None, Cart::empty());
        h.reconciler.add_item(&payload("A", "Red", 1)).await.unwrap();
        h.reconciler.add_item(&payload("GONE", "Red", 1)).await.unwrap();
        h.remote.reject("GONE");

        let report = h.reconciler.login(SecretString::from("jwt")).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, vec![line("GONE", "Red")]);
        assert_eq!(h.store.get(keys::CART).unwrap(), None);
        assert_eq!(h.reconciler.total_item_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_when_final_fetch_fails_keeps_state() {
        let h = harness(Some("jwt"), Cart::empty());
        h.store
            .set(keys::CART, r#"{"items":[{"productId":"A","qty":1}]}"#)
            .unwrap();
        h.remote.set_offline(true);

        let report = h.reconciler.sync_on_login().await.unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(!report.fetched);
        assert_eq!(h.store.get(keys::CART).unwrap(), None);
        assert_eq!(h.reconciler.snapshot(), CartSnapshot::default());
    }

    #[tokio::test]
    async fn test_signed_in_add_uses_server_cart() {
        let h = harness(Some("jwt"), Cart::empty());
        let cart = h.reconciler.add_item(&payload("A", "Red", 1)).await.unwrap();

        assert_eq!(cart, h.remote.server_cart());
        assert_eq!(h.reconciler.snapshot().source, CartSource::Remote);
        assert!(h.store.get(keys::CART).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signed_in_add_falls_back_to_local() {
        let h = harness(Some("jwt"), Cart::empty());
        h.remote.set_offline(true);

        let cart = h.reconciler.add_item(&payload("A", "Red", 1)).await.unwrap();

        assert!(cart.find(&line("A", "Red")).is_some());
        assert!(h.store.get(keys::CART).unwrap().is_some());
        let snapshot = h.reconciler.snapshot();
        assert!(snapshot.source.is_fallback());
        assert_eq!(snapshot.cart, cart);
    }

    #[tokio::test]
    async fn test_fallback_reads_persisted_snapshot() {
        let h = harness(Some("jwt"), Cart::with_items(vec![server_item("S", 5)]));
        h.reconciler.init().await;
        h.store
            .set(keys::CART, r#"{"items":[{"productId":"L","qty":1}]}"#)
            .unwrap();
        h.remote.set_offline(true);

        let cart = h.reconciler.add_item(&payload("A", "Red", 1)).await.unwrap();

        // Built from the persisted guest cart, not the server cart on screen.
        assert_eq!(cart.total_item_count(), 2);
        assert!(cart.find(&LineKey::new("S", Some("Red"), Some("M"))).is_none());
    }

    #[tokio::test]
    async fn test_loading_flag_spans_server_fetch() {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, "jwt").unwrap();
        let session = Arc::new(SessionContext::restore(Arc::new(store.clone())));
        let remote = Arc::new(SlowRemote::default());
        let reconciler = Arc::new(CartReconciler::new(
            session,
            LocalCartStore::new(Arc::new(store)),
            Arc::clone(&remote) as Arc<dyn RemoteCart>,
        ));
        assert!(!reconciler.is_loading());

        let init = tokio::spawn({
            let reconciler = Arc::clone(&reconciler);
            async move { reconciler.init().await }
        });
        while !reconciler.is_loading() {
            tokio::task::yield_now().await;
        }
        assert!(reconciler.snapshot().loading);
        assert!(reconciler.snapshot().cart.is_empty());

        remote.release.notify_one();
        let snapshot = init.await.unwrap();

        assert!(!snapshot.loading);
        assert!(!reconciler.is_loading());
        assert_eq!(snapshot.source, CartSource::Remote);
        assert_eq!(reconciler.total_item_count(), 2);
    }

    #[tokio::test]
    async fn test_signed_in_update_to_zero_is_sent_as_update() {
        let h = harness(
            Some("jwt"),
            Cart::with_items(vec![server_item("A", 2), server_item("B", 1)]),
        );
        h.reconciler.init().await;

        let cart = h
            .reconciler
            .update_quantity(&line("A", "Red"), 0)
            .await
            .unwrap();

        assert!(cart.find(&line("A", "Red")).is_none());
        assert_eq!(cart.total_item_count(), 1);
        assert_eq!(h.remote.updates.load(Ordering::SeqCst), 1);
        assert_eq!(h.remote.removes.load(Ordering::SeqCst), 0);
        assert_eq!(h.reconciler.snapshot().source, CartSource::Remote);
    }

    #[tokio::test]
    async fn test_signed_in_update_to_zero_of_unknown_line_falls_back() {
        let h = harness(Some("jwt"), Cart::with_items(vec![server_item("B", 1)]));
        h.store
            .set(
                keys::CART,
                r#"{"items":[{"productId":"A","selectedColor":"Red","selectedSize":"M","qty":3}]}"#,
            )
            .unwrap();

        let cart = h
            .reconciler
            .update_quantity(&line("A", "Red"), 0)
            .await
            .unwrap();

        // The server has no such line; the guest cart drops it instead.
        assert!(cart.is_empty());
        assert_eq!(h.remote.updates.load(Ordering::SeqCst), 1);
        assert_eq!(h.remote.removes.load(Ordering::SeqCst), 0);
        assert_eq!(h.remote.server_cart().total_item_count(), 1);
        assert_eq!(h.reconciler.snapshot().source, CartSource::LocalFallback);
    }

    #[tokio::test]
    async fn test_signed_in_update_and_remove_fall_back() {
        let h = harness(Some("jwt"), Cart::empty());
        h.remote.set_offline(true);
        h.reconciler.add_item(&payload("A", "Red", 1)).await.unwrap();

        let cart = h
            .reconciler
            .update_quantity(&line("A", "Red"), 4)
            .await
            .unwrap();
        assert_eq!(cart.total_item_count(), 4);

        let cart = h.reconciler.remove_item(&line("A", "Red")).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(h.reconciler.snapshot().source, CartSource::LocalFallback);
    }

    #[tokio::test]
    async fn test_clear_signed_in_failure_is_logged_only() {
        let h = harness(Some("jwt"), Cart::with_items(vec![server_item("S", 1)]));
        h.remote.set_offline(true);

        let cart = h.reconciler.clear_cart().await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(h.remote.clears.load(Ordering::SeqCst), 1);
        assert_eq!(h.reconciler.snapshot().source, CartSource::LocalFallback);
        assert_eq!(
            h.store.get(keys::CART).unwrap().as_deref(),
            Some(r#"{"items":[]}"#)
        );
    }

    #[tokio::test]
    async fn test_clear_guest_skips_server() {
        let h = harness(None, Cart::empty());
        h.reconciler.add_item(&payload("A", "Red", 1)).await.unwrap();

        h.reconciler.clear_cart().await.unwrap();

        assert_eq!(h.remote.clears.load(Ordering::SeqCst), 0);
        assert_eq!(h.reconciler.total_item_count(), 0);
    }

    #[tokio::test]
    async fn test_logout_shows_guest_cart() {
        let h = harness(Some("jwt"), Cart::with_items(vec![server_item("S", 3)]));
        h.reconciler.init().await;
        h.store
            .set(keys::CART, r#"{"items":[{"productId":"L","qty":1}]}"#)
            .unwrap();

        let snapshot = h.reconciler.logout().await.unwrap();

        assert_eq!(snapshot.source, CartSource::Local);
        assert_eq!(snapshot.total_item_count(), 1);
        assert!(!h.reconciler.session().is_authenticated());
        assert!(h.store.get(keys::TOKEN).unwrap().is_none());
        // Server cart is untouched.
        assert_eq!(h.remote.server_cart().total_item_count(), 3);
    }

    #[tokio::test]
    async fn test_set_cart_replaces_state_only() {
        let h = harness(None, Cart::empty());
        let cart = Cart::with_items(vec![server_item("A", 7)]);

        let snapshot = h.reconciler.set_cart(cart).await;

        assert_eq!(snapshot.total_item_count(), 7);
        assert_eq!(h.reconciler.total_item_count(), 7);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let h = harness(Some("jwt"), Cart::empty());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let reconciler = Arc::clone(&h.reconciler);
                tokio::spawn(async move { reconciler.add_item(&payload("A", "Red", 1)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(h.remote.server_cart().total_item_count(), 20);
        assert_eq!(h.reconciler.total_item_count(), 20);
    }

    #[tokio::test]
    async fn test_session_token_is_rechecked_per_operation() {
        let h = harness(None, Cart::empty());
        h.reconciler.add_item(&payload("A", "Red", 1)).await.unwrap();
        assert_eq!(h.remote.adds.load(Ordering::SeqCst), 0);

        h.reconciler
            .session()
            .set_token(SecretString::from("jwt"))
            .unwrap();
        h.reconciler.add_item(&payload("B", "Red", 1)).await.unwrap();

        assert_eq!(h.remote.adds.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.reconciler
                .session()
                .bearer_token()
                .unwrap()
                .expose_secret(),
            "jwt"
        );
    }
}
