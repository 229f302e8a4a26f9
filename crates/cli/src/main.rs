//! Shopfront CLI - Drive the wishlist and cart mirror from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the signed-in user's wishlist
//! shopfront wishlist show
//!
//! # Toggle a product on the wishlist
//! shopfront wishlist toggle 6428ebc6b53d0d0e4a4f5f1c
//!
//! # Set a cart line's quantity
//! shopfront cart set 6428ebc6b53d0d0e4a4f5f1c 3
//! ```
//!
//! # Commands
//!
//! - `wishlist` - Show, add, remove or toggle wishlist products
//! - `cart` - Show the cart, add products, change quantities, remove lines
//!
//! # Environment Variables
//!
//! See `shopfront_sync::config`. `SHOPFRONT_API_BASE_URL` and
//! `SHOPFRONT_API_TOKEN` are required for every command.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use shopfront_sync::ShopfrontConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;
use commands::cart::Step;

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront wishlist and cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Print the wishlist
    Show,
    /// Add a product
    Add {
        /// Product ID
        product_id: String,
    },
    /// Remove a product
    Remove {
        /// Product ID
        product_id: String,
    },
    /// Add the product if absent, remove it if present
    Toggle {
        /// Product ID
        product_id: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add one of a product
    Add {
        /// Product ID
        product_id: String,
    },
    /// Set a line's quantity (values below 1 become 1)
    Set {
        /// Product ID
        product_id: String,
        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// One more of a line
    Inc {
        /// Product ID
        product_id: String,
    },
    /// One fewer of a line, never below 1
    Dec {
        /// Product ID
        product_id: String,
    },
    /// Remove a line
    Remove {
        /// Product ID
        product_id: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ShopfrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
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

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = ShopfrontConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_sync=info,shopfront_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ShopfrontConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Wishlist { action } => match action {
            WishlistAction::Show => commands::wishlist::show(config).await,
            WishlistAction::Add { product_id } => commands::wishlist::add(config, &product_id).await,
            WishlistAction::Remove { product_id } => {
                commands::wishlist::remove(config, &product_id).await
            }
            WishlistAction::Toggle { product_id } => {
                commands::wishlist::toggle(config, &product_id).await
            }
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(config).await,
            CartAction::Add { product_id } => commands::cart::add(config, &product_id).await,
            CartAction::Set {
                product_id,
                quantity,
            } => commands::cart::set(config, &product_id, quantity).await,
            CartAction::Inc { product_id } => {
                commands::cart::step(config, &product_id, Step::Increment).await
            }
            CartAction::Dec { product_id } => {
                commands::cart::step(config, &product_id, Step::Decrement).await
            }
            CartAction::Remove { product_id } => commands::cart::remove(config, &product_id).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_negative_quantity() {
        let cli = Cli::try_parse_from(["shopfront", "cart", "set", "p1", "-2"]);
        assert!(matches!(
            cli.map(|cli| cli.command),
            Ok(Commands::Cart {
                action: CartAction::Set { quantity: -2, .. }
            })
        ));
    }
}
