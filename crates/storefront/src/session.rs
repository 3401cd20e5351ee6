//! Session guard and explicit session context.
//!
//! The session is a bearer token. It is held in a [`SessionContext`] that is
//! handed to the reconciler and the API client at construction, and is
//! re-checked on every cart operation rather than cached.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};

use crate::storage::{KeyValueStore, StorageError};

/// Storage keys shared by the cart client.
pub mod keys {
    /// Key for the persisted session token.
    pub const TOKEN: &str = "token";

    /// Key for the persisted guest cart snapshot.
    pub const CART: &str = "gosporty_cart";
}

/// Whether a session currently exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable token.
    Guest,
    /// A usable token is present. It may still be rejected by the server.
    Authenticated,
}

/// Returns `true` if `raw` is a usable token.
///
/// Stringified `null`/`undefined` values leaking out of storage count as
/// no token. There is no expiry check.
#[must_use]
pub fn is_usable_token(raw: &str) -> bool {
    !raw.is_empty() && raw != "null" && raw != "undefined"
}

/// The session token, optionally mirrored to persistent storage.
pub struct SessionContext {
    token: RwLock<Option<SecretString>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &self.state())
            .field("token", &"[REDACTED]")
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl SessionContext {
    /// A session with no token and no persistence.
    #[must_use]
    pub fn guest() -> Self {
        Self {
            token: RwLock::new(None),
            store: None,
        }
    }

    /// A non-persistent session holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(SecretString::from(token.into()))),
            store: None,
        }
    }

    /// Restore the session from `store`, persisting later changes back to it.
    ///
    /// An unreadable token is logged and treated as no session.
    #[must_use]
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let token = match store.get(keys::TOKEN) {
            Ok(token) => token.map(SecretString::from),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored session token");
                None
            }
        };

        Self {
            token: RwLock::new(token),
            store: Some(store),
        }
    }

    /// Whether the current token makes this an authenticated session.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Guest
        }
    }

    /// The session guard: `true` iff a usable token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| is_usable_token(t.expose_secret()))
    }

    /// The token to send as a bearer credential, if usable.
    #[must_use]
    pub fn bearer_token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|t| is_usable_token(t.expose_secret()))
            .cloned()
    }

    /// Install a new token (login).
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted. The in-memory
    /// token is updated either way.
    pub fn set_token(&self, token: SecretString) -> Result<(), StorageError> {
        let persisted = self
            .store
            .as_ref()
            .map(|store| store.set(keys::TOKEN, token.expose_secret()));
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        persisted.transpose().map(|_| ())
    }

    /// Drop the token (logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted token cannot be removed. The
    /// in-memory token is cleared either way.
    pub fn clear(&self) -> Result<(), StorageError> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.store
            .as_ref()
            .map(|store| store.remove(keys::TOKEN))
            .transpose()
            .map(|_| ())
    }
}
