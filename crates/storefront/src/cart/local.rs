//! Local cart store: the guest cart persisted in client-side storage.
//!
//! Always reads the persisted snapshot, never in-memory state, so the
//! fallback path mutates what is actually on disk.

use std::sync::Arc;

use gosporty_core::{Cart, CartItem, LineKey};

use crate::session::keys;
use crate::storage::{KeyValueStore, StorageError};

/// The persisted guest cart.
#[derive(Clone)]
pub struct LocalCartStore {
    store: Arc<dyn KeyValueStore>,
}

impl LocalCartStore {
    /// Create a store over `store`, using the fixed `gosporty_cart` key.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the persisted cart.
    ///
    /// A missing key, unreadable storage, invalid JSON or a malformed shape
    /// all yield an empty cart. Server metadata is dropped.
    #[must_use]
    pub fn load(&self) -> Cart {
        let raw = match self.store.get(keys::CART) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cart::empty(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read local cart, using empty cart");
                return Cart::empty();
            }
        };

        match serde_json::from_str::<Cart>(&raw) {
            Ok(cart) => Cart::with_items(cart.items),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding malformed local cart");
                Cart::empty()
            }
        }
    }

    /// Persist `cart`, replacing any previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be serialized or written.
    pub fn save(&self, cart: &Cart) -> Result<(), StorageError> {
        let raw = serde_json::to_string(cart)?;
        self.store.set(keys::CART, &raw)
    }

    /// Remove the persisted snapshot entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be removed.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(keys::CART)
    }

    /// Add `item`, merging into a matching line, and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be persisted.
    pub fn add(&self, item: CartItem) -> Result<Cart, StorageError> {
        self.mutate(|cart| cart.add_item(item))
    }

    /// Set a line's quantity (zero removes it) and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be persisted.
    pub fn update_quantity(&self, line: &LineKey, quantity: u32) -> Result<Cart, StorageError> {
        self.mutate(|cart| cart.set_quantity(line, quantity))
    }

    /// Remove a line and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be persisted.
    pub fn remove(&self, line: &LineKey) -> Result<Cart, StorageError> {
        self.mutate(|cart| cart.remove(line))
    }

    /// Persist an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be persisted.
    pub fn empty(&self) -> Result<Cart, StorageError> {
        let cart = Cart::empty();
        self.save(&cart)?;
        Ok(cart)
    }

    fn mutate(&self, apply: impl FnOnce(&mut Cart)) -> Result<Cart, StorageError> {
        let mut cart = self.load();
        apply(&mut cart);
        tracing::debug!(lines = cart.items.len(), "Saving local cart");
        self.save(&cart)?;
        Ok(cart)
    }
}
