//! GoSporty Core - Shared cart types library.
//!
//! This crate provides the types used across all GoSporty cart components:
//! - `storefront` - Cart reconciliation library (local store, remote client, reconciler)
//! - `cli` - Command-line front end for the cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart algorithms - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows the
//! same merge rules to run against the local guest cart and in tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, cart lines and add-to-cart payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
