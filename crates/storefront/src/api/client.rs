//! `reqwest` implementation of the backend API.

use std::sync::Arc;

use async_trait::async_trait;
use gosporty_core::{Cart, CartItem, LineKey};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::types::{ErrorBody, LoginResponse, UpdateQuantityRequest};
use super::{ApiError, RemoteCart};
use crate::config::ApiConfig;
use crate::session::SessionContext;

/// Longest slice of a response body copied into logs and errors.
const BODY_EXCERPT_CHARS: usize = 200;

/// Client for the GoSporty backend.
///
/// Cheaply cloneable. Reads the bearer token from the shared
/// [`SessionContext`] on every request, so a login or logout takes effect
/// on the next call.
#[derive(Clone)]
pub struct CartApiClient {
    inner: Arc<CartApiClientInner>,
}

struct CartApiClientInner {
    client: reqwest::Client,
    config: ApiConfig,
    session: Arc<SessionContext>,
}

impl CartApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig, session: Arc<SessionContext>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(CartApiClientInner {
                client,
                config: config.clone(),
                session,
            }),
        })
    }

    /// Exchange credentials for a session token.
    ///
    /// Does not install the token; hand it to the cart service's `login` so
    /// the guest cart gets merged.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for bad credentials, or any
    /// transport/parse error.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, ApiError> {
        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
        });
        let request = self.request(Method::POST, "login")?.json(&body);
        self.send_json(request).await
    }

    /// Build a request with the bearer token attached when a session exists.
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.inner.config.endpoint(path)?;
        let mut request = self.inner.client.request(method, url);
        if let Some(token) = self.inner.session.bearer_token() {
            request = request.bearer_auth(token.expose_secret());
        }
        Ok(request)
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let message = error_message(&text);
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(message));
        }

        tracing::debug!(status = %status, body = %message, "API returned non-success status");
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let text = self.send(request).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(&text),
                "Failed to parse API response"
            );
            ApiError::Parse(e.to_string())
        })
    }

    /// Parse a cart body; `null` or a body without `items` is an empty cart.
    async fn send_cart(&self, request: RequestBuilder) -> Result<Cart, ApiError> {
        let cart: Option<Cart> = self.send_json(request).await?;
        Ok(cart.unwrap_or_default())
    }
}

#[async_trait]
impl RemoteCart for CartApiClient {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<Cart, ApiError> {
        let request = self.request(Method::GET, "cart")?;
        self.send_cart(request).await
    }

    #[instrument(skip(self, item), fields(product_id = %item.product_id, qty = item.quantity))]
    async fn add_item(&self, item: &CartItem) -> Result<Cart, ApiError> {
        let request = self.request(Method::POST, "cart")?.json(item);
        self.send_cart(request).await
    }

    #[instrument(skip(self, line), fields(product_id = %line.product_id))]
    async fn update_quantity(&self, line: &LineKey, quantity: u32) -> Result<Cart, ApiError> {
        let body = UpdateQuantityRequest {
            line,
            qty: quantity,
        };
        let request = self.request(Method::PUT, "cart/update")?.json(&body);
        self.send_cart(request).await
    }

    #[instrument(skip(self, line), fields(product_id = %line.product_id))]
    async fn remove_item(&self, line: &LineKey) -> Result<Cart, ApiError> {
        let request = self.request(Method::DELETE, "cart/remove")?.json(line);
        self.send_cart(request).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, "cart/clear")?;
        self.send(request).await.map(|_| ())
    }
}

/// Pull the message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).map_or_else(|_| excerpt(body), |b| b.error)
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
