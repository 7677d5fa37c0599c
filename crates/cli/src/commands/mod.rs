//! CLI command implementations.

pub mod carts;
pub mod key;

use std::path::PathBuf;

use cartkeeper_storefront::storage::StorageError;
use thiserror::Error;

/// Default storage root, matching the storefront's default.
const DEFAULT_STORAGE_DIR: &str = "./data/carts";

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Storage could not be opened, read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Persisted cart is not valid JSON.
    #[error("Persisted cart is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// An option argument is not `code=value`.
    #[error("Invalid option `{0}`, expected code=value")]
    InvalidOption(String),
}

/// Storage root from `CART_STORAGE_DIR`, or the default.
pub fn storage_dir_from_env() -> PathBuf {
    std::env::var("CART_STORAGE_DIR")
        .map_or_else(|_| PathBuf::from(DEFAULT_STORAGE_DIR), PathBuf::from)
}
