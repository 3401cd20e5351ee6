//! Command implementations.

pub mod cart;
pub mod session;

use gosporty_storefront::{CartError, CartService, StorefrontConfig};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(&'static str),
}

impl CommandError {
    /// Log the failure. Cart errors are also reported to Sentry.
    pub fn report(&self) {
        match self {
            Self::Cart(e) => e.capture(),
            Self::Output(_) | Self::Usage(_) => tracing::error!("Command failed: {self}"),
        }
    }
}

/// Connect to the cart and load it for the stored session.
async fn open(config: &StorefrontConfig) -> Result<CartService, CommandError> {
    let service = CartService::connect(config)?;
    let snapshot = service.init().await;
    tracing::debug!(source = ?snapshot.source, "Cart loaded");
    Ok(service)
}

/// Print `value` as pretty JSON on stdout.
fn print_json(value: &impl Serialize) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use gosporty_core::PayloadError;

    use super::*;

    #[test]
    fn test_cart_failures_keep_their_message() {
        let err = CommandError::from(CartError::from(PayloadError::MissingProductId));
        assert_eq!(
            err.to_string(),
            "Invalid payload: add-to-cart payload has no product id"
        );
        err.report();
    }

    #[test]
    fn test_usage_error_reports_without_sentry() {
        let err = CommandError::Usage("login needs --token or --email with --password");
        assert_eq!(
            err.to_string(),
            "login needs --token or --email with --password"
        );
        err.report();
    }
}
