// ABOUTME: Version-gated migration strategies and the rehydration steps applied to a stored value.
// ABOUTME: Decodes raw values, runs matching migrations in order, and merges the result into state.

use std::fmt;
use std::sync::Arc;

use keepsake_core::path::{get_value, merge_shallow, set_value};
use serde_json::{Map, Value};

use crate::codec::StateCodec;
use crate::options::ROOT_STATE_KEY;

/// Transforms a stored value from one schema version to the next.
pub type MigrateFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A migration that fires when the value at `version_key` equals `version`
/// and the key being loaded is `key` (None means the root state key).
#[derive(Clone)]
pub struct MigrationStrategy {
    pub version: i64,
    pub version_key: String,
    pub key: Option<String>,
    pub migrate: MigrateFn,
}

impl fmt::Debug for MigrationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStrategy")
            .field("version", &self.version)
            .field("version_key", &self.version_key)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl MigrationStrategy {
    /// A root-state migration gated on the `"version"` field.
    pub fn new<F>(version: i64, migrate: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            version,
            version_key: "version".to_string(),
            key: None,
            migrate: Arc::new(migrate),
        }
    }

    /// Scope this migration to one storage key.
    pub fn for_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Read the version from a different (dot-separated) path.
    pub fn version_key(mut self, version_key: impl Into<String>) -> Self {
        self.version_key = version_key.into();
        self
    }

    pub fn matches(&self, key: &str, value: &Value) -> bool {
        let key_match = match &self.key {
            None => key == ROOT_STATE_KEY,
            Some(scoped) => scoped == key,
        };
        let version_match = get_value(value, &self.version_key)
            .and_then(Value::as_f64)
            .is_some_and(|found| found == self.version as f64);
        key_match && version_match
    }
}

/// A migrated value and how many strategies fired to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOutcome {
    pub value: Value,
    pub applied: usize,
}

/// Ordered list of migration strategies.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    strategies: Vec<MigrationStrategy>,
}

impl MigrationRegistry {
    pub fn new(strategies: Vec<MigrationStrategy>) -> Self {
        Self { strategies }
    }

    /// Run every matching strategy in registration order. Each strategy's
    /// gate is checked against the value produced by the ones before it, so
    /// consecutive versions can chain within one pass.
    pub fn apply(&self, key: &str, value: Value) -> MigrationOutcome {
        let mut outcome = MigrationOutcome { value, applied: 0 };
        for strategy in &self.strategies {
            if strategy.matches(key, &outcome.value) {
                tracing::info!(
                    "migrating {} from {} {}",
                    key,
                    strategy.version_key,
                    strategy.version
                );
                outcome.value = (strategy.migrate)(outcome.value);
                outcome.applied += 1;
            }
        }
        outcome
    }
}

/// Turn a raw stored value into the value to merge into state.
///
/// Returns None when there is nothing usable (absent, empty, the literal
/// `"undefined"`, or a stored null). A value that fails to decode is
/// replaced with an empty object so startup never aborts on a corrupt blob.
pub fn rehydrate(
    raw: Option<&str>,
    key: &str,
    codec: &dyn StateCodec,
    migrations: &MigrationRegistry,
) -> Option<MigrationOutcome> {
    let raw = raw.filter(|r| !r.is_empty() && *r != "undefined")?;

    let value = match codec.deserialize(raw) {
        Ok(Value::Null) => return None,
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                "error occurred while deserializing stored value for {}, falling back to empty object: {}",
                key,
                e
            );
            Value::Object(Map::new())
        }
    };

    Some(migrations.apply(key, value))
}

/// Merge a rehydrated value into the state tree: the root key overwrites
/// top-level fields, any other key replaces the slice at its path.
pub fn merge_into_state(state: &mut Value, key: &str, value: Value) {
    if key == ROOT_STATE_KEY {
        merge_shallow(state, value);
    } else {
        set_value(state, key, value);
    }
}
