// ABOUTME: Configuration for the persistence plugin: keys, storage selection, codec, and migrations.
// ABOUTME: Built once with a builder and never mutated after the plugin takes it.

use std::fmt;
use std::sync::Arc;

use crate::codec::{JsonCodec, StateCodec};
use crate::engine::StorageOption;
use crate::migration::MigrationStrategy;

/// Storage key that stands for the entire state tree rather than one slice.
pub const ROOT_STATE_KEY: &str = "@@STATE";

#[derive(Clone)]
pub struct PluginOptions {
    pub keys: Vec<String>,
    pub storage: StorageOption,
    pub codec: Arc<dyn StateCodec>,
    pub migrations: Vec<MigrationStrategy>,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            keys: vec![ROOT_STATE_KEY.to_string()],
            storage: StorageOption::default(),
            codec: Arc::new(JsonCodec),
            migrations: Vec::new(),
        }
    }
}

impl fmt::Debug for PluginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginOptions")
            .field("keys", &self.keys)
            .field("storage", &self.storage)
            .field("migrations", &self.migrations.len())
            .finish_non_exhaustive()
    }
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a single key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys = vec![key.into()];
        self
    }

    /// Persist several keys, each stored separately.
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn storage(mut self, storage: StorageOption) -> Self {
        self.storage = storage;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn StateCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Append a migration; strategies run in the order they are added.
    pub fn migration(mut self, strategy: MigrationStrategy) -> Self {
        self.migrations.push(strategy);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_root_state_in_local_storage() {
        let options = PluginOptions::default();
        assert_eq!(options.keys, vec![ROOT_STATE_KEY.to_string()]);
        assert!(matches!(options.storage, StorageOption::Local));
        assert!(options.migrations.is_empty());
    }

    #[test]
    fn builder_replaces_keys() {
        let options = PluginOptions::new().key("counter").keys(["a", "b.c"]);
        assert_eq!(options.keys, vec!["a".to_string(), "b.c".to_string()]);
    }
}
