// ABOUTME: Middleware pipeline that every dispatched action flows through before reaching handlers.
// ABOUTME: Plugins receive the shared state, the action, and a Next continuation they must run once.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::action::Action;
use crate::registry::ActionRegistry;
use crate::store::StoreError;

/// The live state tree. Plugins may patch it in place at any time; the
/// final pipeline stage applies handlers to it under the write lock.
pub type SharedState = Arc<RwLock<Value>>;

/// A middleware stage in the action pipeline.
///
/// Implementations must call `next.run(..)` exactly once (enforced by `Next`
/// being consumed) and return the state it produced, possibly transformed.
/// Work that should not hold up the dispatch belongs in a spawned task.
#[async_trait]
pub trait Plugin: Send + Sync {
    async fn handle(
        &self,
        state: &SharedState,
        action: &Action,
        next: Next<'_>,
    ) -> Result<Value, StoreError>;
}

/// The remainder of the pipeline after the current plugin.
pub struct Next<'a> {
    plugins: &'a [Arc<dyn Plugin>],
    registry: &'a ActionRegistry,
}

impl<'a> Next<'a> {
    pub fn new(plugins: &'a [Arc<dyn Plugin>], registry: &'a ActionRegistry) -> Self {
        Self { plugins, registry }
    }

    /// Run the rest of the pipeline and return the resulting state.
    pub async fn run(self, state: &SharedState, action: &Action) -> Result<Value, StoreError> {
        match self.plugins.split_first() {
            Some((plugin, rest)) => {
                let next = Next {
                    plugins: rest,
                    registry: self.registry,
                };
                plugin.handle(state, action, next).await
            }
            None => {
                let mut guard = state.write().await;
                let ran = self.registry.apply(&mut guard, action);
                tracing::trace!("action {} ran {} handlers", action.action_type, ran);
                Ok(guard.clone())
            }
        }
    }
}
