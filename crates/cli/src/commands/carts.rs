//! Persisted cart inspection and cleanup.
//!
//! # Usage
//!
//! ```bash
//! ck-cli show --visitor <id>
//! ck-cli clear --visitor <id>
//! ```

use std::path::Path;
use std::sync::Arc;

use cartkeeper_core::{CartLineItem, CartSessionId, CartSnapshot, VisitorId};
use cartkeeper_storefront::storage::{
    DurableStore, FileStore, ScopedStore, SessionIdentityStore, keys,
};

use super::CommandError;

fn visitor_store(
    storage_dir: &Path,
    visitor: &str,
) -> Result<Arc<dyn DurableStore>, CommandError> {
    let root: Arc<dyn DurableStore> = Arc::new(FileStore::open(storage_dir)?);
    Ok(Arc::new(ScopedStore::for_visitor(root, &VisitorId::new(visitor))))
}

/// Summary of a visitor's durable cart state.
#[derive(Debug)]
pub struct CartReport {
    /// Local cart contents, if any were persisted.
    pub snapshot: Option<CartSnapshot>,
    /// Remote cart identity, if any was persisted.
    pub session: Option<String>,
}

/// Read a visitor's durable cart state.
///
/// # Errors
///
/// Returns an error if storage cannot be read or the item list is not valid
/// JSON.
pub fn inspect(storage_dir: &Path, visitor: &str) -> Result<CartReport, CommandError> {
    let store = visitor_store(storage_dir, visitor)?;

    let snapshot = match store.read(keys::CART_ITEMS)? {
        Some(raw) => {
            let items: Vec<CartLineItem> = serde_json::from_str(&raw)?;
            Some(CartSnapshot::derived(items))
        }
        None => None,
    };
    let session = SessionIdentityStore::new(store)
        .load()
        .map(CartSessionId::into_inner);

    Ok(CartReport { snapshot, session })
}

/// Print a visitor's persisted cart.
///
/// # Errors
///
/// See [`inspect`].
#[allow(clippy::print_stdout)]
pub fn show(storage_dir: &Path, visitor: &str) -> Result<(), CommandError> {
    let report = inspect(storage_dir, visitor)?;

    match &report.snapshot {
        Some(snapshot) => {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
            println!(
                "{} line(s), {} unit(s), subtotal {}",
                snapshot.items.len(),
                snapshot.item_count(),
                snapshot.subtotal_display
            );
        }
        None => println!("No local cart persisted"),
    }
    match &report.session {
        Some(session) => println!("Remote cart identity: {session}"),
        None => println!("No remote cart identity"),
    }
    Ok(())
}

/// Remove a visitor's persisted cart and cart identity.
///
/// # Errors
///
/// Returns an error if storage cannot be written.
pub fn clear(storage_dir: &Path, visitor: &str) -> Result<(), CommandError> {
    let store = visitor_store(storage_dir, visitor)?;
    store.remove(keys::CART_ITEMS)?;
    SessionIdentityStore::new(store).clear()?;
    tracing::info!("Cleared cart state for visitor {visitor}");
    Ok(())
}
