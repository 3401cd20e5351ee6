//! GoSporty CLI - inspect and edit the cart from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the current cart
//! gs-cli cart show
//!
//! # Add a product as a guest, then sign in and merge
//! gs-cli cart add 665f1c -q 2 --color Red --size M
//! gs-cli login --email shopper@example.com --password secret
//!
//! # Item count and subtotal
//! gs-cli cart count
//! ```
//!
//! # Commands
//!
//! - `cart show|add|update|remove|clear|count` - Cart operations
//! - `login` - Start a session (token or email/password) and merge the guest cart
//! - `logout` - End the session
//! - `sync` - Merge the guest cart into the server cart for the stored session
//!
//! Configuration comes from the environment; see
//! `gosporty_storefront::config`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{ArgGroup, Parser, Subcommand};
use gosporty_storefront::StorefrontConfig;
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::cart::{AddArgs, LineOptions};
use commands::CommandError;
use commands::session::Credentials;

#[derive(Parser)]
#[command(name = "gs-cli")]
#[command(author, version, about = "GoSporty cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Sign in and merge the guest cart into the server cart
    #[command(group(ArgGroup::new("credentials").required(true).args(["token", "email"])))]
    Login {
        /// Existing session token
        #[arg(long)]
        token: Option<String>,

        /// Account email
        #[arg(short, long, requires = "password")]
        email: Option<String>,

        /// Account password
        #[arg(short, long, requires = "email")]
        password: Option<String>,
    },
    /// Sign out
    Logout,
    /// Merge the guest cart into the server cart
    Sync,
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add a product
    Add(AddArgs),
    /// Set a line's quantity (0 removes it)
    Update {
        /// Product ID
        product_id: String,

        /// New quantity
        quantity: u32,

        #[command(flatten)]
        line: LineOptions,
    },
    /// Remove a line
    Remove {
        /// Product ID
        product_id: String,

        #[command(flatten)]
        line: LineOptions,
    },
    /// Empty the cart
    Clear,
    /// Print the item count and subtotal
    Count,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gosporty_storefront=info,gosporty_cli=info".into());

    // Logs go to stderr; stdout carries the JSON output
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);
    init_tracing();
    if sentry_guard.is_some() {
        tracing::debug!("Sentry initialized");
    }

    if let Err(e) = run(cli, &config).await {
        e.report();
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), CommandError> {
    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(config).await?,
            CartAction::Add(args) => commands::cart::add(config, &args).await?,
            CartAction::Update {
                product_id,
                quantity,
                line,
            } => commands::cart::update(config, &product_id, quantity, &line).await?,
            CartAction::Remove { product_id, line } => {
                commands::cart::remove(config, &product_id, &line).await?;
            }
            CartAction::Clear => commands::cart::clear(config).await?,
            CartAction::Count => commands::cart::count(config).await?,
        },
        Commands::Login {
            token,
            email,
            password,
        } => {
            let credentials = match (token, email, password) {
                (Some(token), _, _) => Credentials::Token(SecretString::from(token)),
                (None, Some(email), Some(password)) => Credentials::Password {
                    email,
                    password: SecretString::from(password),
                },
                _ => {
                    return Err(CommandError::Usage(
                        "login needs --token or --email with --password",
                    ));
                }
            };
            commands::session::login(config, credentials).await?;
        }
        Commands::Logout => commands::session::logout(config).await?,
        Commands::Sync => commands::session::sync(config).await?,
    }
    Ok(())
}
