//! Observable cart state.
//!
//! Every adopted cart is published as a [`CartSnapshot`] on a
//! `tokio::sync::watch` channel so subscribers re-render on change.

use gosporty_core::Cart;
use rust_decimal::Decimal;
use serde::Serialize;

/// Which store produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartSource {
    /// Guest cart from client-side storage.
    #[default]
    Local,
    /// Cart confirmed by the server.
    Remote,
    /// Client-side cart adopted because a server call failed while signed
    /// in. May diverge from the server cart.
    LocalFallback,
}

impl CartSource {
    /// Returns `true` if this snapshot may disagree with the server.
    #[must_use]
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::LocalFallback)
    }
}

/// The current cart as seen by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    pub cart: Cart,
    pub source: CartSource,
    /// Set while the initial server fetch is in flight.
    pub loading: bool,
}

impl CartSnapshot {
    #[must_use]
    pub const fn new(cart: Cart, source: CartSource) -> Self {
        Self {
            cart,
            source,
            loading: false,
        }
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.cart.total_item_count()
    }

    /// Sum of `price * qty` across all lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.cart.subtotal()
    }
}
