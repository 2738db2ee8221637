// ABOUTME: Explicit action registration table mapping action types to ordered state handlers.
// ABOUTME: Populated with plain function calls at startup; applied by the final pipeline stage.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::action::Action;
use crate::path::{get_value, set_value};

/// A reducer over one slice of state: receives the slice (Null when absent)
/// and the action payload, and mutates the slice in place.
pub type Handler = Arc<dyn Fn(&mut Value, &Value) + Send + Sync>;

/// One registered handler together with the state path it operates on.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub state_path: String,
    pub handler: Handler,
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("state_path", &self.state_path)
            .finish_non_exhaustive()
    }
}

/// A named state slice and the value it starts with.
#[derive(Debug, Clone)]
pub struct StateDefinition {
    pub name: String,
    pub defaults: Value,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>, defaults: Value) -> Self {
        Self {
            name: name.into(),
            defaults,
        }
    }
}

/// Mapping from action type to the handlers that run for it, in the order
/// they were registered.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Vec<HandlerDescriptor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one action type against the slice at `state_path`.
    pub fn on<F>(&mut self, action_type: &str, state_path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        self.push(action_type, state_path, Arc::new(handler));
        self
    }

    /// Register the same handler for several action types.
    pub fn on_many<F>(&mut self, action_types: &[&str], state_path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        for action_type in action_types {
            self.push(action_type, state_path, Arc::clone(&handler));
        }
        self
    }

    fn push(&mut self, action_type: &str, state_path: &str, handler: Handler) {
        self.handlers
            .entry(action_type.to_string())
            .or_default()
            .push(HandlerDescriptor {
                state_path: state_path.to_string(),
                handler,
            });
    }

    /// Handlers registered for an action type, in registration order.
    pub fn handlers_for(&self, action_type: &str) -> &[HandlerDescriptor] {
        self.handlers
            .get(action_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Run every handler registered for `action` against `state`.
    /// Returns the number of handlers that ran.
    pub fn apply(&self, state: &mut Value, action: &Action) -> usize {
        let descriptors = self.handlers_for(&action.action_type);
        for descriptor in descriptors {
            let mut slice = get_value(state, &descriptor.state_path)
                .cloned()
                .unwrap_or(Value::Null);
            (descriptor.handler)(&mut slice, &action.payload);
            set_value(state, &descriptor.state_path, slice);
        }
        descriptors.len()
    }
}
