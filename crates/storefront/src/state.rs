//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use cartkeeper_core::VisitorId;
use moka::future::Cache;

use crate::cart::{StorefrontCart, SyncedCart};
use crate::cart_api::{CartService, GraphQlCartService, ServiceError};
use crate::config::{CartBackend, LocalCartConfig, StorefrontConfig};
use crate::storage::{DurableStore, FileStore, ScopedStore, StorageError};

/// Idle time after which a visitor's engine is dropped from memory.
const CART_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Maximum number of engines held in memory.
const MAX_LIVE_CARTS: u64 = 10_000;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("cart service: {0}")]
    Service(#[from] ServiceError),
    #[error("remote backend selected without cart service settings")]
    MissingRemoteConfig,
}

/// How the registry builds a visitor's engine.
enum EngineFactory<S> {
    Local(LocalCartConfig),
    Remote { service: S, cache_ttl: Duration },
}

/// One cart engine per visitor.
///
/// Engines are held in a `moka` cache with idle eviction. An evicted engine
/// is rebuilt from durable storage on the visitor's next request, which is
/// the server-side equivalent of a page reload.
pub struct CartRegistry<S = GraphQlCartService> {
    store: Arc<dyn DurableStore>,
    factory: EngineFactory<S>,
    carts: Cache<VisitorId, Arc<StorefrontCart<S>>>,
}

impl<S: CartService + Clone + 'static> CartRegistry<S> {
    /// Registry of local carts persisted in `store`.
    #[must_use]
    pub fn local(store: Arc<dyn DurableStore>, config: LocalCartConfig) -> Self {
        Self::with_factory(store, EngineFactory::Local(config))
    }

    /// Registry of synced carts backed by `service`.
    #[must_use]
    pub fn remote(store: Arc<dyn DurableStore>, service: S, cache_ttl: Duration) -> Self {
        Self::with_factory(store, EngineFactory::Remote { service, cache_ttl })
    }

    fn with_factory(store: Arc<dyn DurableStore>, factory: EngineFactory<S>) -> Self {
        Self {
            store,
            factory,
            carts: Cache::builder()
                .max_capacity(MAX_LIVE_CARTS)
                .time_to_idle(CART_IDLE_TIMEOUT)
                .build(),
        }
    }

    /// The backend every engine in this registry runs on.
    #[must_use]
    pub const fn backend(&self) -> CartBackend {
        match self.factory {
            EngineFactory::Local(_) => CartBackend::Local,
            EngineFactory::Remote { .. } => CartBackend::Remote,
        }
    }

    /// The visitor's engine, built from durable storage if not live.
    pub async fn cart_for(&self, visitor: &VisitorId) -> Arc<StorefrontCart<S>> {
        self.carts
            .get_with_by_ref(visitor, async { Arc::new(self.build(visitor)) })
            .await
    }

    /// Drop the visitor's live engine. Durable state is kept.
    pub async fn forget(&self, visitor: &VisitorId) {
        self.carts.invalidate(visitor).await;
    }

    fn build(&self, visitor: &VisitorId) -> StorefrontCart<S> {
        tracing::debug!(visitor = %visitor, backend = ?self.backend(), "Building cart engine");
        let store: Arc<dyn DurableStore> =
            Arc::new(ScopedStore::for_visitor(Arc::clone(&self.store), visitor));
        match &self.factory {
            EngineFactory::Local(config) => StorefrontCart::local(store, config.synthetic_delay),
            EngineFactory::Remote { service, cache_ttl } => {
                StorefrontCart::Synced(SyncedCart::new(service.clone(), store, *cache_ttl))
            }
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration and the cart registry.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    carts: CartRegistry,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// Opens file-backed storage under `config.storage_dir` and, for the
    /// remote backend, builds the cart service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or the
    /// HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let store: Arc<dyn DurableStore> = Arc::new(FileStore::open(&config.storage_dir)?);
        let carts = match config.backend {
            CartBackend::Local => CartRegistry::local(store, config.local),
            CartBackend::Remote => {
                let remote = config
                    .remote
                    .as_ref()
                    .ok_or(StateError::MissingRemoteConfig)?;
                let service = GraphQlCartService::new(&remote.api)?;
                CartRegistry::remote(store, service, remote.cache_ttl)
            }
        };
        Ok(Self::with_registry(config, carts))
    }

    /// Create application state around an existing registry.
    #[must_use]
    pub fn with_registry(config: StorefrontConfig, carts: CartRegistry) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, carts }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the per-visitor cart registry.
    #[must_use]
    pub fn carts(&self) -> &CartRegistry {
        &self.inner.carts
    }
}
