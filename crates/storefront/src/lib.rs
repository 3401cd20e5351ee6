//! GoSporty storefront cart client.
//!
//! Keeps a shopper's cart consistent across two stores: a guest cart in
//! client-side storage and the server cart behind the backend API. The
//! [`cart::CartService`] is the entry point.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;

pub use cart::{CartService, CartSnapshot, CartSource, SyncReport};
pub use config::StorefrontConfig;
pub use error::{CartError, Result};
