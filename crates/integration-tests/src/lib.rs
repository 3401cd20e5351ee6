//! Integration tests for the GoSporty cart client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gosporty-integration-tests
//! ```
//!
//! No backend is needed: [`TestBackend`] serves the cart endpoints from a
//! `wiremock` server holding one in-memory server cart, and [`TestContext`]
//! points a [`CartService`] at it with file storage in a temp directory.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gosporty_core::{Cart, CartId, CartItem, LineKey, UserId};
use gosporty_storefront::config::ApiConfig;
use gosporty_storefront::session::keys;
use gosporty_storefront::{CartService, StorefrontConfig};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Token the mock backend accepts.
pub const VALID_TOKEN: &str = "test-token";

/// Credentials the mock backend accepts on `/login`.
pub const EMAIL: &str = "shopper@example.com";
pub const PASSWORD: &str = "secret";

/// Product the mock backend refuses to add (e.g. discontinued).
pub const REJECTED_PRODUCT: &str = "discontinued";

// =============================================================================
// Mock backend
// =============================================================================

/// A stateful mock of the backend cart API.
pub struct TestBackend {
    pub server: MockServer,
    cart: Arc<Mutex<Cart>>,
}

#[derive(Clone, Copy)]
enum Route {
    Fetch,
    Add,
    Update,
    Remove,
    Clear,
}

/// Serves one cart route against the shared server cart.
#[derive(Clone)]
struct CartResponder {
    route: Route,
    cart: Arc<Mutex<Cart>>,
}

impl Respond for CartResponder {
    fn respond(&self, req: &Request) -> ResponseTemplate {
        if !is_authorized(req) {
            return ResponseTemplate::new(401)
                .set_body_json(json!({"error": "Please login to sync cart"}));
        }

        let body: Value = serde_json::from_slice(&req.body).unwrap_or(Value::Null);
        let mut cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);

        match self.route {
            Route::Fetch => {}
            Route::Add => {
                let Ok(item) = serde_json::from_value::<CartItem>(body) else {
                    return ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid item"}));
                };
                if item.product_id.as_str() == REJECTED_PRODUCT {
                    return ResponseTemplate::new(404)
                        .set_body_json(json!({"error": "Product not found"}));
                }
                cart.add_item(item);
            }
            Route::Update => {
                let Some(line) = line_from(&body) else {
                    return ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid line"}));
                };
                let qty = body["qty"].as_u64().and_then(|q| u32::try_from(q).ok()).unwrap_or(0);
                if cart.find(&line).is_none() {
                    return ResponseTemplate::new(404)
                        .set_body_json(json!({"error": "Item not found in cart"}));
                }
                cart.set_quantity(&line, qty);
            }
            Route::Remove => {
                let Some(line) = line_from(&body) else {
                    return ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid line"}));
                };
                cart.remove(&line);
            }
            Route::Clear => {
                cart.clear();
                return ResponseTemplate::new(200)
                    .set_body_json(json!({"message": "Cart cleared successfully"}));
            }
        }

        ResponseTemplate::new(200).set_body_json(&*cart)
    }
}

fn is_authorized(req: &Request) -> bool {
    req.headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {VALID_TOKEN}"))
}

fn line_from(body: &Value) -> Option<LineKey> {
    let product_id = body["productId"].as_str()?;
    Some(LineKey::new(
        product_id,
        body["selectedColor"].as_str(),
        body["selectedSize"].as_str(),
    ))
}

/// Accepts [`EMAIL`]/[`PASSWORD`] and issues [`VALID_TOKEN`].
struct LoginResponder;

impl Respond for LoginResponder {
    fn respond(&self, req: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&req.body).unwrap_or(Value::Null);
        if body["email"] == EMAIL && body["password"] == PASSWORD {
            ResponseTemplate::new(200).set_body_json(json!({
                "token": VALID_TOKEN,
                "user": {"_id": "user-1", "email": EMAIL, "name": "Shopper", "isAdmin": false}
            }))
        } else {
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid email or password"}))
        }
    }
}

impl TestBackend {
    /// Start a backend with an empty server cart.
    pub async fn start() -> Self {
        let backend = Self {
            server: MockServer::start().await,
            cart: Arc::new(Mutex::new(Cart {
                id: Some(CartId::new("cart-1")),
                user_id: Some(UserId::new("user-1")),
                ..Cart::default()
            })),
        };
        backend.mount_routes().await;
        backend
    }

    async fn mount_routes(&self) {
        let routes = [
            ("GET", "/api/cart", Route::Fetch),
            ("POST", "/api/cart", Route::Add),
            ("PUT", "/api/cart/update", Route::Update),
            ("DELETE", "/api/cart/remove", Route::Remove),
            ("DELETE", "/api/cart/clear", Route::Clear),
        ];
        for (verb, route_path, route) in routes {
            Mock::given(method(verb))
                .and(path(route_path))
                .respond_with(CartResponder {
                    route,
                    cart: Arc::clone(&self.cart),
                })
                .mount(&self.server)
                .await;
        }

        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(LoginResponder)
            .mount(&self.server)
            .await;
    }

    /// The server cart as the backend currently holds it.
    pub fn cart(&self) -> Cart {
        self.cart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Put `items` in the server cart.
    pub fn seed(&self, items: Vec<CartItem>) {
        self.cart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .items = items;
    }

    /// Make every request fail with 503 until [`Self::go_online`].
    pub async fn go_offline(&self) {
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"error": "Service unavailable"})),
            )
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Undo [`Self::go_offline`]. The server cart is kept.
    pub async fn go_online(&self) {
        self.server.reset().await;
        self.mount_routes().await;
    }

    /// Number of requests received on `route_path` with `verb`.
    pub async fn requests_to(&self, verb: &str, route_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == verb && r.url.path() == route_path)
            .count()
    }
}

// =============================================================================
// Test context
// =============================================================================

/// A backend plus a data directory for one simulated client.
pub struct TestContext {
    pub backend: TestBackend,
    pub data_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self {
            backend: TestBackend::start().await,
            data_dir: tempfile::tempdir().expect("create temp data dir"),
        }
    }

    /// Configuration pointing at the mock backend.
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig {
            api: ApiConfig::new(&self.backend.server.uri(), Duration::from_secs(5))
                .expect("mock server URI is a valid URL"),
            data_dir: self.data_dir.path().to_path_buf(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Start a client process: connect and load the cart.
    pub async fn client(&self) -> CartService {
        let service = CartService::connect(&self.config()).expect("connect cart service");
        service.init().await;
        service
    }

    /// Raw JSON of the persisted guest cart, if any.
    pub fn stored_cart(&self) -> Option<String> {
        std::fs::read_to_string(self.storage_path(keys::CART)).ok()
    }

    /// Raw persisted session token, if any.
    pub fn stored_token(&self) -> Option<String> {
        std::fs::read_to_string(self.storage_path(keys::TOKEN)).ok()
    }

    fn storage_path(&self, key: &str) -> PathBuf {
        self.data_dir.path().join(format!("{key}.json"))
    }
}
