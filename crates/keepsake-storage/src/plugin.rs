// ABOUTME: Persistence plugin that rehydrates configured keys on bootstrap and writes them after every action.
// ABOUTME: Storage work runs in detached tasks so the action pipeline never waits on I/O.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use keepsake_core::path::get_value;
use keepsake_core::{Action, Next, Plugin, SharedState, StoreError};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::codec::StateCodec;
use crate::engine::{StorageContext, StorageEngine, StorageError, engine_for};
use crate::migration::{MigrationRegistry, merge_into_state, rehydrate};
use crate::options::{PluginOptions, ROOT_STATE_KEY};

/// Serialized in place of a slice that does not exist in the state tree.
static MISSING_SLICE: Value = Value::Null;

/// Errors surfaced by a rehydration pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistError {
    #[error("failed to rehydrate {key}: {message}")]
    Rehydrate { key: String, message: String },

    #[error("rehydration task failed: {0}")]
    Task(String),
}

/// What a completed rehydration pass did for each configured key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydrationReport {
    pub restored: Vec<String>,
    pub skipped: Vec<String>,
    pub migrations_applied: usize,
}

#[derive(Debug, Clone, Default)]
struct HydrationState {
    pass: u64,
    outcome: Option<Result<HydrationReport, PersistError>>,
}

struct PersistenceInner {
    keys: Vec<String>,
    codec: Arc<dyn StateCodec>,
    migrations: MigrationRegistry,
    engine: Arc<dyn StorageEngine>,
    passes: AtomicU64,
    hydration: watch::Sender<HydrationState>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

/// Store plugin that keeps the configured keys in a StorageEngine.
///
/// On the bootstrap and feature-added actions every key is read
/// concurrently, migrated, and patched into the live state as its read
/// resolves; the action itself is forwarded without waiting. After every
/// other action each key is written from the state the pipeline produced.
/// A bootstrap pass only writes back when a migration fired, so upgraded
/// data is re-stored once in its new format.
///
/// An action dispatched before the reads resolve is persisted from the
/// default state and can overwrite stored values; await `hydrated()` first.
pub struct PersistencePlugin {
    inner: Arc<PersistenceInner>,
}

impl PersistencePlugin {
    /// Build a plugin over an explicit engine. `options.storage` is ignored.
    pub fn new(options: PluginOptions, engine: Arc<dyn StorageEngine>) -> Self {
        let (hydration, _) = watch::channel(HydrationState::default());
        Self {
            inner: Arc::new(PersistenceInner {
                keys: options.keys,
                codec: options.codec,
                migrations: MigrationRegistry::new(options.migrations),
                engine,
                passes: AtomicU64::new(0),
                hydration,
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build a plugin whose engine is resolved from `options.storage`.
    pub fn from_options(options: PluginOptions, ctx: &StorageContext) -> Result<Self, StorageError> {
        let engine = engine_for(&options.storage, ctx)?;
        Ok(Self::new(options, engine))
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.inner.engine
    }

    pub fn keys(&self) -> &[String] {
        &self.inner.keys
    }

    /// Wait for the latest rehydration pass to finish. Waits for the first
    /// pass if none has started yet. A failed storage read is reported here
    /// rather than swallowed.
    pub async fn hydrated(&self) -> Result<HydrationReport, PersistError> {
        let mut rx = self.inner.hydration.subscribe();
        loop {
            let outcome = rx.borrow_and_update().outcome.clone();
            if let Some(outcome) = outcome {
                return outcome;
            }
            rx.changed()
                .await
                .map_err(|_| PersistError::Task("hydration channel closed".to_string()))?;
        }
    }

    /// Wait for every storage task spawned so far, including writes queued
    /// by tasks that finish while flushing.
    pub async fn flush(&self) {
        loop {
            let pending = std::mem::take(
                &mut *self
                    .inner
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::error!("persistence task failed: {}", e);
                }
            }
        }
    }

    /// Start reading every key in the background. Returns the pass number
    /// and the task that resolves once all keys are merged.
    fn start_rehydration(
        &self,
        state: &SharedState,
    ) -> (u64, JoinHandle<Result<HydrationReport, PersistError>>) {
        let pass = self.inner.begin_pass();
        let inner = Arc::clone(&self.inner);
        let state = Arc::clone(state);

        let task = tokio::spawn(async move {
            let result = inner.rehydrate_all(&state).await;
            inner.finish_pass(pass, &result);
            result
        });

        (pass, task)
    }
}

#[async_trait]
impl Plugin for PersistencePlugin {
    async fn handle(
        &self,
        state: &SharedState,
        action: &Action,
        next: Next<'_>,
    ) -> Result<Value, StoreError> {
        let rehydration = action
            .is_init_or_update()
            .then(|| self.start_rehydration(state));

        let produced = next.run(state, action).await?;

        match rehydration {
            None => self.inner.persist_all(&produced),
            Some((pass, reads)) => {
                let inner = Arc::clone(&self.inner);
                let state = Arc::clone(state);
                let continuation = tokio::spawn(async move {
                    match reads.await {
                        Ok(Ok(report)) if report.migrations_applied > 0 => {
                            let current = state.read().await.clone();
                            inner.persist_all(&current);
                        }
                        Ok(Ok(report)) => {
                            tracing::debug!(
                                "rehydrated {:?}, skipped {:?}",
                                report.restored,
                                report.skipped
                            );
                        }
                        Ok(Err(e)) => tracing::error!("{}", e),
                        Err(e) => {
                            tracing::error!("rehydration task failed: {}", e);
                            inner.finish_pass(pass, &Err(PersistError::Task(e.to_string())));
                        }
                    }
                });
                self.inner.track(continuation);
            }
        }

        Ok(produced)
    }
}

impl PersistenceInner {
    fn begin_pass(&self) -> u64 {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        self.hydration.send_replace(HydrationState {
            pass,
            outcome: None,
        });
        pass
    }

    /// Record the outcome of a pass unless a newer pass has already begun.
    fn finish_pass(&self, pass: u64, result: &Result<HydrationReport, PersistError>) {
        self.hydration.send_if_modified(|current| {
            if current.pass != pass {
                return false;
            }
            current.outcome = Some(result.clone());
            true
        });
    }

    async fn rehydrate_all(&self, state: &SharedState) -> Result<HydrationReport, PersistError> {
        let reads = self.keys.iter().map(|key| self.rehydrate_key(key, state));
        let results = join_all(reads).await;

        let mut report = HydrationReport::default();
        for (key, result) in self.keys.iter().zip(results) {
            match result? {
                Some(applied) => {
                    report.restored.push(key.clone());
                    report.migrations_applied += applied;
                }
                None => report.skipped.push(key.clone()),
            }
        }
        Ok(report)
    }

    /// Read, decode, migrate, and merge one key. Returns the number of
    /// migrations applied, or None when the key held nothing usable.
    async fn rehydrate_key(&self, key: &str, state: &SharedState) -> Result<Option<usize>, PersistError> {
        let raw = self
            .engine
            .get_item(key)
            .await
            .map_err(|e| PersistError::Rehydrate {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let Some(outcome) = rehydrate(raw.as_deref(), key, self.codec.as_ref(), &self.migrations)
        else {
            tracing::debug!("nothing stored for {}, keeping defaults", key);
            return Ok(None);
        };

        let mut guard = state.write().await;
        merge_into_state(&mut guard, key, outcome.value);
        tracing::debug!("rehydrated {}", key);
        Ok(Some(outcome.applied))
    }

    /// Spawn one write per key from the given state. Failures are logged and
    /// never reach the pipeline.
    fn persist_all(&self, state: &Value) {
        for key in &self.keys {
            let slice = if key == ROOT_STATE_KEY {
                state
            } else {
                get_value(state, key).unwrap_or(&MISSING_SLICE)
            };

            let raw = match self.codec.serialize(slice) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!(
                        "error occurred while serializing {}, value not updated: {}",
                        key,
                        e
                    );
                    continue;
                }
            };

            let engine = Arc::clone(&self.engine);
            let key = key.clone();
            self.track(tokio::spawn(async move {
                match engine.set_item(&key, &raw).await {
                    Ok(()) => tracing::debug!("persisted {}", key),
                    Err(e) => tracing::error!(
                        "error occurred while persisting {}, value not updated: {}",
                        key,
                        e
                    ),
                }
            }));
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}
