//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart for the stored session (or the guest cart)
//! gs-cli cart show
//!
//! # Add two of a product in a specific color and size
//! gs-cli cart add 665f1c -q 2 --color Red --size M --price 150000 --name "Ball"
//!
//! # Change or remove a line
//! gs-cli cart update 665f1c 3 --color Red --size M
//! gs-cli cart remove 665f1c --color Red --size M
//! ```

use gosporty_core::{AddItemPayload, LineKey, Price};
use gosporty_storefront::{CartService, StorefrontConfig};

use super::{open, print_json, CommandError};

/// Options identifying a line by its color and size.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LineOptions {
    /// Selected color (defaults to the store's default color)
    #[arg(long)]
    pub color: Option<String>,

    /// Selected size (defaults to "One Size")
    #[arg(long)]
    pub size: Option<String>,
}

impl LineOptions {
    fn key(&self, product_id: &str) -> LineKey {
        LineKey::new(product_id, self.color.as_deref(), self.size.as_deref())
    }
}

/// Arguments for `cart add`.
#[derive(Debug, Clone, clap::Args)]
pub struct AddArgs {
    /// Product ID
    pub product_id: String,

    /// Quantity to add
    #[arg(short, long, default_value_t = 1)]
    pub quantity: u32,

    #[command(flatten)]
    pub line: LineOptions,

    /// Unit price
    #[arg(long)]
    pub price: Option<Price>,

    /// Product name shown in the cart
    #[arg(long)]
    pub name: Option<String>,

    /// Product image URL
    #[arg(long)]
    pub image: Option<String>,
}

impl AddArgs {
    fn payload(&self) -> AddItemPayload {
        let mut payload = AddItemPayload::new(self.product_id.as_str()).with_quantity(self.quantity);
        payload.selected_color.clone_from(&self.line.color);
        payload.selected_size.clone_from(&self.line.size);
        payload.price = self.price;
        payload.name.clone_from(&self.name);
        payload.image.clone_from(&self.image);
        payload
    }
}

/// Print the current cart with its source.
pub async fn show(config: &StorefrontConfig) -> Result<(), CommandError> {
    let service = open(config).await?;
    print_json(&service.snapshot())
}

/// Add a product to the cart.
pub async fn add(config: &StorefrontConfig, args: &AddArgs) -> Result<(), CommandError> {
    let service = open(config).await?;
    service.add_item(&args.payload()).await?;
    print_current(&service)
}

/// Set the quantity of a line. Zero removes it.
pub async fn update(
    config: &StorefrontConfig,
    product_id: &str,
    quantity: u32,
    line: &LineOptions,
) -> Result<(), CommandError> {
    let service = open(config).await?;
    service
        .update_quantity(&line.key(product_id), quantity)
        .await?;
    print_current(&service)
}

/// Remove a line.
pub async fn remove(
    config: &StorefrontConfig,
    product_id: &str,
    line: &LineOptions,
) -> Result<(), CommandError> {
    let service = open(config).await?;
    service.remove_item(&line.key(product_id)).await?;
    print_current(&service)
}

/// Empty the cart.
pub async fn clear(config: &StorefrontConfig) -> Result<(), CommandError> {
    let service = open(config).await?;
    service.clear_cart().await?;
    print_current(&service)
}

/// Print the item count and subtotal.
pub async fn count(config: &StorefrontConfig) -> Result<(), CommandError> {
    let service = open(config).await?;
    print_json(&serde_json::json!({
        "count": service.total_item_count(),
        "subtotal": service.subtotal().to_string(),
        "source": service.snapshot().source,
    }))
}

fn print_current(service: &CartService) -> Result<(), CommandError> {
    let snapshot = service.snapshot();
    if snapshot.source.is_fallback() {
        tracing::warn!("Server unreachable; showing the local cart, which may differ from the server");
    }
    print_json(&snapshot)
}
