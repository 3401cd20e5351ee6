//! Cart lines and the pure merge rules applied to them.
//!
//! A line is identified by its `(product, color, size)` triple: the same
//! product in two colors is two lines. These rules run unchanged against the
//! guest cart and the fallback path, so they live here rather than next to
//! the storage code.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::id::{CartId, ProductId, UserId};
use super::price::Price;

/// Color recorded when a line is added without one.
pub const DEFAULT_COLOR: &str = "Mặc định";

/// Size recorded when a line is added without one.
pub const DEFAULT_SIZE: &str = "One Size";

/// Display name recorded when a line is added without one.
pub const DEFAULT_NAME: &str = "Sản phẩm";

fn default_color() -> String {
    DEFAULT_COLOR.to_owned()
}

fn default_size() -> String {
    DEFAULT_SIZE.to_owned()
}

/// Resolve an optional, possibly blank option value to its sentinel.
pub(crate) fn option_or_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_owned(),
        _ => default.to_owned(),
    }
}

/// One entry in a cart.
///
/// Serializes to the wire/storage shape shared with the backend:
/// `{ productId, qty, selectedColor, selectedSize, price, name, image }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Number of units, always at least 1.
    #[serde(rename = "qty")]
    pub quantity: u32,
    /// Selected color option.
    #[serde(default = "default_color")]
    pub selected_color: String,
    /// Selected size option.
    #[serde(default = "default_size")]
    pub selected_size: String,
    /// Unit price at the time the line was added.
    #[serde(rename = "price", default)]
    pub unit_price: Price,
    /// Product title captured at add time.
    #[serde(rename = "name", default)]
    pub display_name: String,
    /// Product image captured at add time.
    #[serde(rename = "image", default)]
    pub image_url: String,
}

impl CartItem {
    /// The identity triple of this line.
    #[must_use]
    pub fn line_key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            selected_color: self.selected_color.clone(),
            selected_size: self.selected_size.clone(),
        }
    }

    /// Returns `true` if this item is the line identified by `key`.
    #[must_use]
    pub fn is_line(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id
            && self.selected_color == key.selected_color
            && self.selected_size == key.selected_size
    }

    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.times(self.quantity)
    }
}

/// Identity of a cart line: `(product, color, size)`.
///
/// Blank color or size resolve to the same sentinels used when adding, so a
/// key built from user input matches the stored line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineKey {
    pub product_id: ProductId,
    pub selected_color: String,
    pub selected_size: String,
}

impl LineKey {
    /// Build a key, defaulting blank options.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, color: Option<&str>, size: Option<&str>) -> Self {
        Self {
            product_id: product_id.into(),
            selected_color: option_or_default(color, DEFAULT_COLOR),
            selected_size: option_or_default(size, DEFAULT_SIZE),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<CartItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<CartItem>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A shopping cart.
///
/// Server carts carry `_id`, `userId` and `updatedAt`; the guest cart only
/// has `items`. A `null` or missing `items` reads as an empty cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CartId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<CartItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a cart holding `items`.
    #[must_use]
    pub fn with_items(items: Vec<CartItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Returns `true` if the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of `price * qty` across all lines, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().fold(Decimal::ZERO, |total, item| {
            total
                .checked_add(item.line_total())
                .unwrap_or(Decimal::MAX)
        })
    }

    /// Find the line identified by `key`.
    #[must_use]
    pub fn find(&self, key: &LineKey) -> Option<&CartItem> {
        self.items.iter().find(|i| i.is_line(key))
    }

    /// Add an item, merging into an existing line with the same triple.
    pub fn add_item(&mut self, item: CartItem) {
        let key = item.line_key();
        if let Some(existing) = self.items.iter_mut().find(|i| i.is_line(&key)) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
    }

    /// Overwrite the quantity of a line.
    ///
    /// A quantity of zero removes the line. Missing lines are left alone.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: u32) {
        if quantity < 1 {
            self.remove(key);
            return;
        }
        if let Some(line) = self.items.iter_mut().find(|i| i.is_line(key)) {
            line.quantity = quantity;
        }
    }

    /// Drop the line identified by `key`.
    pub fn remove(&mut self, key: &LineKey) {
        self.items.retain(|i| !i.is_line(key));
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
