//! Session commands: sign in, sign out, and merge the guest cart.
//!
//! The session token is stored next to the guest cart in the data
//! directory, so later commands run signed in.

use gosporty_storefront::{StorefrontConfig, SyncReport};
use secrecy::SecretString;

use super::{open, print_json, CommandError};

/// How to start a session.
pub enum Credentials {
    /// A token issued earlier by the backend.
    Token(SecretString),
    /// Email and password, exchanged for a token.
    Password { email: String, password: SecretString },
}

/// Sign in and merge the guest cart into the server cart.
pub async fn login(config: &StorefrontConfig, credentials: Credentials) -> Result<(), CommandError> {
    let service = open(config).await?;
    let report = match credentials {
        Credentials::Token(token) => service.login(token).await?,
        Credentials::Password { email, password } => {
            service.login_with_password(&email, &password).await?
        }
    };
    log_report(&report);

    print_json(&serde_json::json!({
        "sync": report,
        "cart": service.snapshot(),
    }))
}

/// Sign out. The guest cart is shown again.
pub async fn logout(config: &StorefrontConfig) -> Result<(), CommandError> {
    let service = open(config).await?;
    let snapshot = service.logout().await?;
    print_json(&snapshot)
}

/// Merge the guest cart into the server cart for the stored session.
pub async fn sync(config: &StorefrontConfig) -> Result<(), CommandError> {
    let service = open(config).await?;
    if !service.session().is_authenticated() {
        tracing::warn!("Not signed in; nothing to sync");
    }
    let report = service.sync_on_login().await?;
    log_report(&report);

    print_json(&serde_json::json!({
        "sync": report,
        "cart": service.snapshot(),
    }))
}

fn log_report(report: &SyncReport) {
    if report.is_complete() {
        tracing::info!(synced = report.synced, "Guest cart merged");
    } else {
        tracing::warn!(
            synced = report.synced,
            failed = report.failed.len(),
            "Some guest cart lines were not merged and have been dropped"
        );
    }
}
