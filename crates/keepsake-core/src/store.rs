// ABOUTME: Async store actor that runs dispatched actions through the plugin pipeline one at a time.
// ABOUTME: Provides StoreHandle for dispatching, subscribing to state changes, and snapshot/reset.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use ulid::Ulid;

use crate::action::Action;
use crate::path::{get_value, set_value};
use crate::pipeline::{Next, Plugin, SharedState};
use crate::registry::{ActionRegistry, StateDefinition};

/// Errors that can occur when dispatching to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store channel closed")]
    ChannelClosed,

    #[error("plugin failed: {0}")]
    Plugin(String),
}

/// Published to subscribers after every action has passed through the pipeline.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub action: Action,
    pub state: Value,
}

/// Everything a store needs at startup: its state slices, the handlers
/// registered against them, and the plugin chain, outermost first.
#[derive(Default)]
pub struct StoreConfig {
    pub states: Vec<StateDefinition>,
    pub registry: ActionRegistry,
    pub plugins: Vec<Arc<dyn Plugin>>,
}

impl StoreConfig {
    pub fn new(registry: ActionRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn state(mut self, definition: StateDefinition) -> Self {
        self.states.push(definition);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Build the initial tree from every state definition's defaults.
    fn initial_state(&self) -> Value {
        let mut root = Value::Object(Map::new());
        for definition in &self.states {
            set_value(&mut root, &definition.name, definition.defaults.clone());
        }
        root
    }
}

enum StoreMessage {
    Dispatch(Action, oneshot::Sender<Result<Value, StoreError>>),
    AddFeature(StateDefinition, oneshot::Sender<Result<Value, StoreError>>),
    Reset(Value, oneshot::Sender<()>),
}

/// Public handle for interacting with a running store.
#[derive(Clone)]
pub struct StoreHandle {
    msg_tx: mpsc::Sender<StoreMessage>,
    change_tx: broadcast::Sender<StateChange>,
    state: SharedState,
    pub store_id: Ulid,
}

impl StoreHandle {
    /// Dispatch an action and await the state the pipeline produced for it.
    pub async fn dispatch(&self, action: Action) -> Result<Value, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.msg_tx
            .send(StoreMessage::Dispatch(action, tx))
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Register a new state slice on the running store. Its defaults are
    /// written unless the slice already holds a value, then the
    /// feature-added action is dispatched.
    pub async fn add_feature(&self, definition: StateDefinition) -> Result<Value, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.msg_tx
            .send(StoreMessage::AddFeature(definition, tx))
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Replace the entire state tree without running the pipeline.
    pub async fn reset(&self, state: Value) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.msg_tx
            .send(StoreMessage::Reset(state, tx))
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)
    }

    /// A copy of the current state tree.
    pub async fn snapshot(&self) -> Value {
        self.state.read().await.clone()
    }

    /// Get a read-only reference to the shared state.
    pub async fn read_state(&self) -> tokio::sync::RwLockReadGuard<'_, Value> {
        self.state.read().await
    }

    /// Subscribe to the state change broadcast stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.change_tx.subscribe()
    }
}

/// Spawn a new store task and return the handle for interacting with it.
/// The bootstrap action is the first thing the store processes, ahead of
/// anything sent through the handle.
pub fn spawn(config: StoreConfig) -> StoreHandle {
    let (msg_tx, msg_rx) = mpsc::channel::<StoreMessage>(64);
    let (change_tx, _) = broadcast::channel::<StateChange>(256);
    let state = Arc::new(RwLock::new(config.initial_state()));
    let store_id = Ulid::new();

    let handle = StoreHandle {
        msg_tx,
        change_tx: change_tx.clone(),
        state: Arc::clone(&state),
        store_id,
    };

    let actor = StoreActor {
        state,
        registry: config.registry,
        plugins: config.plugins,
        msg_rx,
        change_tx,
        store_id,
    };

    tokio::spawn(actor.run());

    handle
}

/// The internal actor that processes store messages in a loop.
struct StoreActor {
    state: SharedState,
    registry: ActionRegistry,
    plugins: Vec<Arc<dyn Plugin>>,
    msg_rx: mpsc::Receiver<StoreMessage>,
    change_tx: broadcast::Sender<StateChange>,
    store_id: Ulid,
}

impl StoreActor {
    async fn run(mut self) {
        tracing::info!("store {} bootstrapping", self.store_id);
        if let Err(e) = self.process(Action::init()).await {
            tracing::error!("store {} bootstrap failed: {}", self.store_id, e);
        }

        while let Some(msg) = self.msg_rx.recv().await {
            match msg {
                StoreMessage::Dispatch(action, reply_tx) => {
                    let result = self.process(action).await;
                    // The caller may have dropped their receiver
                    let _ = reply_tx.send(result);
                }
                StoreMessage::AddFeature(definition, reply_tx) => {
                    {
                        let mut state = self.state.write().await;
                        if get_value(&state, &definition.name).is_none() {
                            set_value(&mut state, &definition.name, definition.defaults);
                        }
                    }
                    tracing::info!("store {} added feature {}", self.store_id, definition.name);
                    let _ = reply_tx.send(self.process(Action::update()).await);
                }
                StoreMessage::Reset(value, reply_tx) => {
                    *self.state.write().await = value.clone();
                    let _ = self.change_tx.send(StateChange {
                        action: Action::new("@@RESET"),
                        state: value,
                    });
                    let _ = reply_tx.send(());
                }
            }
        }

        tracing::debug!("store {} stopped", self.store_id);
    }

    async fn process(&self, action: Action) -> Result<Value, StoreError> {
        let next = Next::new(&self.plugins, &self.registry);
        let produced = next.run(&self.state, &action).await?;

        // Ignore broadcast errors (no active subscribers is fine)
        let _ = self.change_tx.send(StateChange {
            action,
            state: produced.clone(),
        });

        Ok(produced)
    }
}
