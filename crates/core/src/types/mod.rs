//! Core types for the GoSporty cart.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod cart;
pub mod id;
pub mod payload;
pub mod price;

pub use cart::{Cart, CartItem, DEFAULT_COLOR, DEFAULT_NAME, DEFAULT_SIZE, LineKey};
pub use id::*;
pub use payload::{AddItemPayload, PayloadError};
pub use price::{Price, PriceError};
