// ABOUTME: Core library for keepsake: a minimal action-driven state store with a plugin pipeline.
// ABOUTME: Storage and reload plugins build on the types exported here.

pub mod action;
pub mod path;
pub mod pipeline;
pub mod registry;
pub mod store;

pub use action::{Action, INIT_STATE, UPDATE_STATE};
pub use pipeline::{Next, Plugin, SharedState};
pub use registry::{ActionRegistry, HandlerDescriptor, StateDefinition};
pub use store::{StateChange, StoreConfig, StoreError, StoreHandle, spawn};
