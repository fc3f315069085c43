//! RocketShoes cart CLI - one shopper session per invocation.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! rs-cart show
//!
//! # Add one of product 3
//! rs-cart add 3
//!
//! # Set product 3 to 5 pairs
//! rs-cart set 3 5
//!
//! # Remove product 3
//! rs-cart remove 3
//! ```
//!
//! Configuration comes from the environment (see `rocketshoes_cart::config`).
//! The cart is printed after every command, followed by any notices.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rocketshoes_core::ProductId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "rs-cart")]
#[command(author, version, about = "RocketShoes cart session")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cart
    Show,
    /// Add one of a product
    Add {
        /// Product id
        product_id: ProductId,
    },
    /// Remove a product
    Remove {
        /// Product id
        product_id: ProductId,
    },
    /// Set a product's amount (zero or less is ignored)
    Set {
        /// Product id
        product_id: ProductId,

        /// New amount
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only the cart
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rocketshoes_cart=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let session = commands::Session::open()?;

    match cli.command {
        Commands::Show => {}
        Commands::Add { product_id } => session.add(product_id).await,
        Commands::Remove { product_id } => session.remove(product_id).await,
        Commands::Set { product_id, amount } => session.set(product_id, amount).await,
    }

    session.print();
    Ok(())
}
