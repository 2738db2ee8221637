// ABOUTME: Uniform async key/value StorageEngine contract and the adapter for synchronous backends.
// ABOUTME: Also resolves a StorageOption (local, session, custom) into a concrete engine.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::MemoryStorage;
use crate::sqlite::SqliteStorage;

/// File name of the local persistent store inside the configured home.
pub const LOCAL_STORE_FILE: &str = "local.db";

/// Errors raised by storage backends. Engines pass these through untouched.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Async key/value storage used by the persistence plugin. Every operation
/// may suspend, whether or not the backend underneath does.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    async fn length(&self) -> Result<usize, StorageError>;

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}

/// A synchronous key/value store, the shape of a local or session store.
pub trait StorageBackend: Send + Sync {
    fn length(&self) -> Result<usize, StorageError>;

    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn length(&self) -> Result<usize, StorageError> {
        (**self).length()
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }
}

/// Presents a synchronous backend through the async StorageEngine surface.
/// Adds no retry or validation; backend errors are returned as-is.
pub struct SimpleAsyncStorage<B> {
    backend: B,
}

impl<B: StorageBackend> SimpleAsyncStorage<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: StorageBackend> StorageEngine for SimpleAsyncStorage<B> {
    async fn length(&self) -> Result<usize, StorageError> {
        self.backend.length()
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend.get_item(key)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend.set_item(key, value)
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove_item(key)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.backend.clear()
    }
}

/// Which storage the persistence plugin writes to.
#[derive(Clone, Default)]
pub enum StorageOption {
    /// Persistent sqlite store under the configured home directory.
    #[default]
    Local,
    /// Process-scoped in-memory store that outlives individual store instances.
    Session,
    /// A caller-supplied engine.
    Custom(Arc<dyn StorageEngine>),
}

impl fmt::Debug for StorageOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageOption::Local => f.write_str("Local"),
            StorageOption::Session => f.write_str("Session"),
            StorageOption::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Explicit inputs needed to build the built-in engines.
#[derive(Clone)]
pub struct StorageContext {
    pub home: PathBuf,
    pub session: Arc<MemoryStorage>,
}

impl StorageContext {
    /// A context rooted at `home` with a fresh session store.
    pub fn new(home: PathBuf) -> Self {
        Self {
            home,
            session: Arc::new(MemoryStorage::new()),
        }
    }
}

/// Resolve a storage option into an engine.
pub fn engine_for(
    option: &StorageOption,
    ctx: &StorageContext,
) -> Result<Arc<dyn StorageEngine>, StorageError> {
    match option {
        StorageOption::Local => {
            let path = ctx.home.join(LOCAL_STORE_FILE);
            tracing::debug!("opening local store at {}", path.display());
            Ok(Arc::new(SimpleAsyncStorage::new(SqliteStorage::open(&path)?)))
        }
        StorageOption::Session => Ok(Arc::new(SimpleAsyncStorage::new(Arc::clone(&ctx.session)))),
        StorageOption::Custom(engine) => Ok(Arc::clone(engine)),
    }
}
