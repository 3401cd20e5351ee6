//! Add-to-cart payloads and their normalization into cart lines.
//!
//! Product pages send payloads of slightly different shapes: the product id
//! may arrive as `productId` or `_id`, the quantity as `qty` or `quantity`,
//! and options may be missing. [`AddItemPayload::normalize`] resolves all of
//! that into a single [`CartItem`].

use serde::Deserialize;

use super::cart::{CartItem, DEFAULT_COLOR, DEFAULT_NAME, DEFAULT_SIZE, option_or_default};
use super::id::ProductId;
use super::price::Price;

/// Errors that can occur when normalizing an [`AddItemPayload`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Neither `productId` nor `_id` carried a value.
    #[error("add-to-cart payload has no product id")]
    MissingProductId,
}

/// A raw add-to-cart request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemPayload {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    /// Alternate id field sent by product cards.
    #[serde(rename = "_id", default)]
    pub legacy_id: Option<ProductId>,
    #[serde(default)]
    pub qty: Option<u32>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub selected_color: Option<String>,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl AddItemPayload {
    /// Start a payload for `product_id`.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: Some(product_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_quantity(mut self, qty: u32) -> Self {
        self.qty = Some(qty);
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.selected_color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.selected_size = Some(size.into());
        self
    }

    #[must_use]
    pub const fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Resolve the payload into a cart line.
    ///
    /// - product id: `productId`, else `_id`; blank ids count as missing
    /// - quantity: `qty`, else `quantity`, else 1; zero counts as missing
    /// - color/size/name: blank values fall back to their sentinels
    /// - price defaults to zero, image to empty
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::MissingProductId`] if no product id is present.
    pub fn normalize(&self) -> Result<CartItem, PayloadError> {
        let product_id = [&self.product_id, &self.legacy_id]
            .into_iter()
            .flatten()
            .find(|id| !id.is_blank())
            .cloned()
            .ok_or(PayloadError::MissingProductId)?;

        let quantity = [self.qty, self.quantity]
            .into_iter()
            .flatten()
            .find(|q| *q > 0)
            .unwrap_or(1);

        Ok(CartItem {
            product_id,
            quantity,
            selected_color: option_or_default(self.selected_color.as_deref(), DEFAULT_COLOR),
            selected_size: option_or_default(self.selected_size.as_deref(), DEFAULT_SIZE),
            unit_price: self.price.unwrap_or(Price::ZERO),
            display_name: option_or_default(self.name.as_deref(), DEFAULT_NAME),
            image_url: self.image.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_defaults() {
        let item = AddItemPayload::new("A").normalize().unwrap();

        assert_eq!(item.quantity, 1);
        assert_eq!(item.selected_color, DEFAULT_COLOR);
        assert_eq!(item.selected_size, DEFAULT_SIZE);
        assert_eq!(item.display_name, DEFAULT_NAME);
        assert_eq!(item.unit_price, Price::ZERO);
        assert!(item.image_url.is_empty());
    }

    #[test]
    fn test_normalize_alternate_fields() {
        let payload: AddItemPayload =
            serde_json::from_str(r#"{"_id": "B", "quantity": 4, "selectedColor": ""}"#).unwrap();
        let item = payload.normalize().unwrap();

        assert_eq!(item.product_id.as_str(), "B");
        assert_eq!(item.quantity, 4);
        assert_eq!(item.selected_color, DEFAULT_COLOR);
    }

    #[test]
    fn test_normalize_prefers_product_id_and_qty() {
        let payload: AddItemPayload =
            serde_json::from_str(r#"{"productId": "A", "_id": "B", "qty": 2, "quantity": 9}"#)
                .unwrap();
        let item = payload.normalize().unwrap();

        assert_eq!(item.product_id.as_str(), "A");
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn test_zero_qty_falls_through() {
        let payload: AddItemPayload =
            serde_json::from_str(r#"{"productId": "A", "qty": 0, "quantity": 3}"#).unwrap();
        assert_eq!(payload.normalize().unwrap().quantity, 3);

        let payload = AddItemPayload::new("A").with_quantity(0);
        assert_eq!(payload.normalize().unwrap().quantity, 1);
    }

    #[test]
    fn test_missing_product_id() {
        assert_eq!(
            AddItemPayload::default().normalize(),
            Err(PayloadError::MissingProductId)
        );
        let blank = AddItemPayload::new("  ");
        assert_eq!(blank.normalize(), Err(PayloadError::MissingProductId));
    }
}
