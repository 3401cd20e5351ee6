//! GoSporty backend REST API client.
//!
//! # Architecture
//!
//! - `reqwest` for HTTP, JSON request and response bodies
//! - The server cart is the source of truth once a session exists; the
//!   client returns the server's post-mutation cart for every call
//! - No fallback here: failures are returned to the reconciler, which owns
//!   the decision to fall back to the guest cart
//!
//! # Endpoints
//!
//! All paths are relative to `<root>/api/`:
//!
//! - `GET cart`, `POST cart`, `PUT cart/update`, `DELETE cart/remove`,
//!   `DELETE cart/clear`
//! - `POST login`
//!
//! # Example
//!
//! ```rust,ignore
//! use gosporty_storefront::api::{CartApiClient, RemoteCart};
//!
//! let client = CartApiClient::new(&config.api, session.clone())?;
//! let cart = client.fetch_cart().await?;
//! ```

mod client;
pub mod types;

pub use client::CartApiClient;
pub use types::*;

use async_trait::async_trait;
use gosporty_core::{Cart, CartItem, LineKey};
use thiserror::Error;

/// Errors that can occur when calling the backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the session or had none.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Endpoint URL could not be built.
    #[error("Invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Url(_) | Self::Parse(_) => None,
        }
    }
}

/// Server-side cart operations.
///
/// Each call returns the server's authoritative cart after the mutation.
#[async_trait]
pub trait RemoteCart: Send + Sync {
    /// `GET /cart`
    async fn fetch_cart(&self) -> Result<Cart, ApiError>;

    /// `POST /cart`
    async fn add_item(&self, item: &CartItem) -> Result<Cart, ApiError>;

    /// `PUT /cart/update`
    async fn update_quantity(&self, line: &LineKey, quantity: u32) -> Result<Cart, ApiError>;

    /// `DELETE /cart/remove`
    async fn remove_item(&self, line: &LineKey) -> Result<Cart, ApiError>;

    /// `DELETE /cart/clear`
    async fn clear_cart(&self) -> Result<(), ApiError>;
}
