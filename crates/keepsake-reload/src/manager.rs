// ABOUTME: Reload snapshot manager that saves store state before teardown and restores it after re-bootstrap.
// ABOUTME: Provides the ReloadableApp hooks, lifecycle tracking, and the hot_reload bootstrap entry point.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use keepsake_core::path::merge_shallow;
use keepsake_core::{StoreError, StoreHandle};
use keepsake_storage::{CodecError, StorageEngine, StorageError};
use serde_json::Value;
use thiserror::Error;

use crate::snapshot::{RELOAD_SNAPSHOT_KEY, SnapshotStorage};

/// Errors that can occur while capturing or restoring a reload snapshot.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// An application instance that can be torn down and rebuilt by a live
/// reload. Only `store` is required; the hooks default to carrying the
/// whole state tree across.
#[async_trait]
pub trait ReloadableApp: Send + Sync {
    fn store(&self) -> &StoreHandle;

    /// Merge a recovered snapshot into the freshly bootstrapped store.
    async fn on_reload_init(&self, snapshot: Value) -> Result<(), StoreError> {
        let mut state = self.store().snapshot().await;
        merge_shallow(&mut state, snapshot);
        self.store().reset(state).await
    }

    /// Produce the state to carry into the next instance.
    async fn before_reload_destroy(&self) -> Value {
        self.store().snapshot().await
    }

    /// Release the instance after its state has been captured.
    async fn shutdown(&self) {}
}

/// Which hooks have run on this manager's app instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStatus {
    pub on_init_called: bool,
    pub before_on_destroy_called: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReloadPhase {
    #[default]
    Idle,
    Capturing,
    Persisted,
    Restoring,
}

/// Callback run after a snapshot was restored, while it is still held in memory.
pub type AfterOnInit<A> =
    Box<dyn for<'a> FnOnce(&'a mut ReloadSnapshotManager<A>) -> BoxFuture<'a, ()> + Send>;

pub struct ReloadOptions<A> {
    pub snapshot_key: String,
    pub after_on_init: Option<AfterOnInit<A>>,
}

impl<A> Default for ReloadOptions<A> {
    fn default() -> Self {
        Self {
            snapshot_key: RELOAD_SNAPSHOT_KEY.to_string(),
            after_on_init: None,
        }
    }
}

impl<A> ReloadOptions<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot_key(mut self, key: impl Into<String>) -> Self {
        self.snapshot_key = key.into();
        self
    }

    pub fn after_on_init<F>(mut self, callback: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut ReloadSnapshotManager<A>) -> BoxFuture<'a, ()> + Send + 'static,
    {
        self.after_on_init = Some(Box::new(callback));
        self
    }
}

/// Owns one app instance and the reload snapshot slot for it.
pub struct ReloadSnapshotManager<A> {
    app: A,
    storage: SnapshotStorage,
    lifecycle: LifecycleStatus,
    phase: ReloadPhase,
}

impl<A: ReloadableApp> ReloadSnapshotManager<A> {
    pub fn new(app: A, storage: SnapshotStorage) -> Self {
        Self {
            app,
            storage,
            lifecycle: LifecycleStatus::default(),
            phase: ReloadPhase::Idle,
        }
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn storage(&self) -> &SnapshotStorage {
        &self.storage
    }

    pub fn lifecycle(&self) -> LifecycleStatus {
        self.lifecycle
    }

    pub fn phase(&self) -> ReloadPhase {
        self.phase
    }

    /// Capture the app's state and write it to the snapshot slot.
    /// Returns the captured state.
    pub async fn before_module_on_destroy(&mut self) -> Result<Value, ReloadError> {
        self.phase = ReloadPhase::Capturing;
        let state = self.app.before_reload_destroy().await;
        self.storage.save(state.clone()).await?;
        self.phase = ReloadPhase::Persisted;
        self.lifecycle.before_on_destroy_called = true;
        tracing::info!(
            "captured reload snapshot from store {}",
            self.app.store().store_id
        );
        Ok(state)
    }

    /// Capture the state, then shut the app down. The snapshot stays in the
    /// slot for the next instance.
    pub async fn dispose(mut self) -> Result<Value, ReloadError> {
        let state = self.before_module_on_destroy().await?;
        self.app.shutdown().await;
        Ok(state)
    }

    async fn restore(&mut self, after_on_init: Option<AfterOnInit<A>>) -> Result<(), ReloadError> {
        self.phase = ReloadPhase::Restoring;
        let snapshot = self.storage.snapshot().clone();
        self.app.on_reload_init(snapshot).await?;
        self.lifecycle.on_init_called = true;
        tracing::info!(
            "restored reload snapshot into store {}",
            self.app.store().store_id
        );

        if let Some(callback) = after_on_init {
            callback(&mut *self).await;
        }

        self.storage.clear().await?;
        self.phase = ReloadPhase::Idle;
        Ok(())
    }
}

/// Bootstrap an app and restore any reload snapshot waiting in `engine`.
///
/// With an empty slot no hook runs and the app starts from its own
/// defaults. Otherwise the snapshot is merged in, `after_on_init` runs while
/// it is still visible on the manager, and the slot is cleared.
pub async fn hot_reload<A, F, Fut>(
    bootstrap: F,
    options: ReloadOptions<A>,
    engine: Arc<dyn StorageEngine>,
) -> Result<ReloadSnapshotManager<A>, ReloadError>
where
    A: ReloadableApp,
    F: FnOnce() -> Fut,
    Fut: Future<Output = A>,
{
    let app = bootstrap().await;
    let mut manager =
        ReloadSnapshotManager::new(app, SnapshotStorage::new(engine, options.snapshot_key));

    if !manager.storage.load().await? {
        tracing::debug!("no reload snapshot in {}", manager.storage.key());
        return Ok(manager);
    }

    manager.restore(options.after_on_init).await?;
    Ok(manager)
}
