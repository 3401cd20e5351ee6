//! Cart service shared by consumers.

use std::sync::Arc;

use gosporty_core::{AddItemPayload, Cart, LineKey};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::watch;

use super::local::LocalCartStore;
use super::reconciler::{CartReconciler, SyncReport};
use super::state::CartSnapshot;
use crate::api::CartApiClient;
use crate::config::StorefrontConfig;
use crate::error::{set_sentry_user, Result};
use crate::session::SessionContext;
use crate::storage::{FileStore, KeyValueStore};

/// The cart as seen by the rest of the application.
///
/// This struct is cheaply cloneable via `Arc`; every clone shares one
/// reconciler, so operations from all clones go through the same queue.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartServiceInner>,
}

struct CartServiceInner {
    reconciler: CartReconciler,
    api: CartApiClient,
}

impl CartService {
    /// Wire the service to file storage and the backend API.
    ///
    /// The session is restored from the data directory. Call
    /// [`Self::init`] before reading the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(config: &StorefrontConfig) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.data_dir.clone()));
        let session = Arc::new(SessionContext::restore(Arc::clone(&store)));
        let api = CartApiClient::new(&config.api, Arc::clone(&session))?;

        let reconciler = CartReconciler::new(
            session,
            LocalCartStore::new(store),
            Arc::new(api.clone()),
        );

        tracing::debug!(data_dir = %config.data_dir.display(), "Cart service connected");
        Ok(Self::new(reconciler, api))
    }

    /// Wrap an existing reconciler.
    #[must_use]
    pub fn new(reconciler: CartReconciler, api: CartApiClient) -> Self {
        Self {
            inner: Arc::new(CartServiceInner { reconciler, api }),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionContext> {
        self.inner.reconciler.session()
    }

    pub async fn init(&self) -> CartSnapshot {
        self.inner.reconciler.init().await
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.reconciler.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.reconciler.subscribe()
    }

    /// The current cart without its source tag.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.snapshot().cart
    }

    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.inner.reconciler.total_item_count()
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.inner.reconciler.subtotal()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.reconciler.is_loading()
    }

    /// # Errors
    ///
    /// See [`CartReconciler::add_item`].
    pub async fn add_item(&self, payload: &AddItemPayload) -> Result<Cart> {
        self.inner.reconciler.add_item(payload).await
    }

    /// # Errors
    ///
    /// See [`CartReconciler::update_quantity`].
    pub async fn update_quantity(&self, line: &LineKey, quantity: u32) -> Result<Cart> {
        self.inner.reconciler.update_quantity(line, quantity).await
    }

    /// # Errors
    ///
    /// See [`CartReconciler::remove_item`].
    pub async fn remove_item(&self, line: &LineKey) -> Result<Cart> {
        self.inner.reconciler.remove_item(line).await
    }

    /// # Errors
    ///
    /// See [`CartReconciler::clear_cart`].
    pub async fn clear_cart(&self) -> Result<Cart> {
        self.inner.reconciler.clear_cart().await
    }

    pub async fn set_cart(&self, cart: Cart) -> CartSnapshot {
        self.inner.reconciler.set_cart(cart).await
    }

    /// # Errors
    ///
    /// See [`CartReconciler::sync_on_login`].
    pub async fn sync_on_login(&self) -> Result<SyncReport> {
        self.inner.reconciler.sync_on_login().await
    }

    /// Start a session from an existing token.
    ///
    /// # Errors
    ///
    /// See [`CartReconciler::login`].
    pub async fn login(&self, token: SecretString) -> Result<SyncReport> {
        self.inner.reconciler.login(token).await
    }

    /// Sign in with credentials, then start the session and sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the credentials, or see
    /// [`CartReconciler::login`].
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SyncReport> {
        let response = self.inner.api.login(email, password).await?;
        if let Some(user) = &response.user {
            set_sentry_user(&user.id, Some(&user.email));
            tracing::info!(user_id = %user.id, is_admin = user.is_admin, "Signed in");
        }
        self.login(SecretString::from(response.token)).await
    }

    /// # Errors
    ///
    /// See [`CartReconciler::logout`].
    pub async fn logout(&self) -> Result<CartSnapshot> {
        self.inner.reconciler.logout().await
    }
}
