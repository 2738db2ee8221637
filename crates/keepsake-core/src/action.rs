// ABOUTME: Defines the Action envelope dispatched through the store pipeline.
// ABOUTME: Includes the reserved bootstrap and feature-added action types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action type dispatched once when a store is bootstrapped.
pub const INIT_STATE: &str = "@@INIT";

/// Action type dispatched when a state feature is added to a running store.
pub const UPDATE_STATE: &str = "@@UPDATE_STATE";

/// A dispatched action: a type identifier plus an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    /// Create an action with a null payload.
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Value::Null,
        }
    }

    /// Create an action carrying the given payload.
    pub fn with_payload(action_type: impl Into<String>, payload: Value) -> Self {
        Self {
            action_type: action_type.into(),
            payload,
        }
    }

    pub fn init() -> Self {
        Self::new(INIT_STATE)
    }

    pub fn update() -> Self {
        Self::new(UPDATE_STATE)
    }

    /// True for the bootstrap action and the feature-added action, the two
    /// points at which persisted state is read back into the store.
    pub fn is_init_or_update(&self) -> bool {
        self.action_type == INIT_STATE || self.action_type == UPDATE_STATE
    }
}
