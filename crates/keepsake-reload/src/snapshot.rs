// ABOUTME: Dedicated storage slot holding the full state tree across a live reload.
// ABOUTME: Written once before teardown, read once after re-bootstrap, then cleared.

use std::sync::Arc;

use keepsake_storage::{JsonCodec, StateCodec, StorageEngine};
use serde_json::{Map, Value};

use crate::manager::ReloadError;

/// Storage slot name used for reload snapshots unless overridden.
pub const RELOAD_SNAPSHOT_KEY: &str = "@@RELOAD_SNAPSHOT";

/// The reload snapshot slot plus the manager's in-memory copy of it.
/// An empty object in memory and no value in the slot is the resting state.
pub struct SnapshotStorage {
    engine: Arc<dyn StorageEngine>,
    key: String,
    snapshot: Value,
}

impl SnapshotStorage {
    pub fn new(engine: Arc<dyn StorageEngine>, key: impl Into<String>) -> Self {
        Self {
            engine,
            key: key.into(),
            snapshot: Value::Object(Map::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The snapshot currently held in memory.
    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }

    /// Read the slot into memory. Returns false when the slot is empty.
    /// A stored null or an undecodable slot is removed and treated as empty.
    pub async fn load(&mut self) -> Result<bool, ReloadError> {
        let Some(raw) = self.engine.get_item(&self.key).await? else {
            return Ok(false);
        };

        match JsonCodec.deserialize(&raw) {
            Ok(Value::Null) => {
                self.engine.remove_item(&self.key).await?;
                Ok(false)
            }
            Ok(snapshot) => {
                self.snapshot = snapshot;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("discarding unreadable reload snapshot in {}: {}", self.key, e);
                self.engine.remove_item(&self.key).await?;
                Ok(false)
            }
        }
    }

    /// Keep `state` in memory and write it to the slot.
    pub async fn save(&mut self, state: Value) -> Result<(), ReloadError> {
        let raw = JsonCodec.serialize(&state)?;
        self.engine.set_item(&self.key, &raw).await?;
        self.snapshot = state;
        Ok(())
    }

    /// Drop the in-memory snapshot and remove the slot.
    pub async fn clear(&mut self) -> Result<(), ReloadError> {
        self.snapshot = Value::Object(Map::new());
        self.engine.remove_item(&self.key).await?;
        Ok(())
    }
}
