//! Cartkeeper CLI - inspect and maintain persisted carts.
//!
//! # Usage
//!
//! ```bash
//! # Show a visitor's persisted cart and remote cart identity
//! ck-cli show --visitor 6f1c0b2e-0d7e-4e55-9a57-6c1d2b0c9a11
//!
//! # Forget a visitor's cart entirely
//! ck-cli clear --visitor 6f1c0b2e-0d7e-4e55-9a57-6c1d2b0c9a11
//!
//! # Print the variant key for a configuration
//! ck-cli key TSHIRT size=M color=red
//! ```
//!
//! # Environment Variables
//!
//! - `CART_STORAGE_DIR` - Durable storage root (default: ./data/carts)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ck-cli")]
#[command(author, version, about = "Cartkeeper CLI tools")]
struct Cli {
    /// Durable storage root; overrides `CART_STORAGE_DIR`
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a visitor's persisted cart
    Show {
        /// Visitor id (from the session)
        #[arg(short, long)]
        visitor: String,
    },
    /// Remove a visitor's persisted cart and cart identity
    Clear {
        /// Visitor id (from the session)
        #[arg(short, long)]
        visitor: String,
    },
    /// Print the variant key for a product and options
    Key {
        /// Product id
        product: String,

        /// Options as `code=value`
        options: Vec<String>,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), commands::CommandError> {
    let storage_dir = cli.storage_dir.unwrap_or_else(commands::storage_dir_from_env);
    match cli.command {
        Commands::Show { visitor } => commands::carts::show(&storage_dir, &visitor),
        Commands::Clear { visitor } => commands::carts::clear(&storage_dir, &visitor),
        Commands::Key { product, options } => commands::key::print(&product, &options),
    }
}
