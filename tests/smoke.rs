// ABOUTME: End-to-end smoke test for the full keepsake lifecycle.
// ABOUTME: Tests sqlite persistence across restarts, stored-data migration, and a live reload cycle.

use std::sync::Arc;

use async_trait::async_trait;
use keepsake_core::{Action, ActionRegistry, StateDefinition, StoreConfig, StoreHandle, spawn};
use keepsake_reload::{RELOAD_SNAPSHOT_KEY, ReloadOptions, ReloadableApp, hot_reload};
use keepsake_storage::{
    MigrationStrategy, PersistencePlugin, PluginOptions, StorageContext, StorageEngine,
    StorageOption, engine_for,
};
use serde_json::json;

fn counter_config(plugin: Arc<PersistencePlugin>) -> StoreConfig {
    let mut registry = ActionRegistry::new();
    registry.on("increment", "counter", |slice, _| {
        let count = slice["count"].as_i64().unwrap_or(0);
        slice["count"] = json!(count + 1);
    });
    registry.on("rename", "user.name", |slice, payload| {
        *slice = payload.clone();
    });
    StoreConfig::new(registry)
        .state(StateDefinition::new("counter", json!({"count": 0})))
        .state(StateDefinition::new("user", json!({"name": "anonymous"})))
        .plugin(plugin)
}

struct DemoApp {
    store: StoreHandle,
    plugin: Arc<PersistencePlugin>,
}

#[async_trait]
impl ReloadableApp for DemoApp {
    fn store(&self) -> &StoreHandle {
        &self.store
    }

    async fn shutdown(&self) {
        self.plugin.flush().await;
    }
}

#[tokio::test]
async fn smoke_test_full_lifecycle() {
    // 1. Local storage in a temp home
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = StorageContext::new(dir.path().to_path_buf());
    let options = PluginOptions::new().keys(["counter", "user.name"]);

    // 2. First run: nothing stored, defaults survive hydration
    let plugin = Arc::new(PersistencePlugin::from_options(options.clone(), &ctx).unwrap());
    let store = spawn(counter_config(Arc::clone(&plugin)));
    let report = plugin.hydrated().await.unwrap();
    assert_eq!(report.skipped.len(), 2, "fresh storage restores nothing");

    // 3. Dispatch and flush writes
    store.dispatch(Action::new("increment")).await.unwrap();
    store.dispatch(Action::new("increment")).await.unwrap();
    store
        .dispatch(Action::with_payload("rename", json!("ada")))
        .await
        .unwrap();
    plugin.flush().await;
    drop(store);
    drop(plugin);

    // 4. Second run against the same sqlite file restores both keys
    let plugin = Arc::new(PersistencePlugin::from_options(options, &ctx).unwrap());
    let store = spawn(counter_config(Arc::clone(&plugin)));
    let report = plugin.hydrated().await.unwrap();
    assert_eq!(report.restored.len(), 2);
    assert_eq!(
        store.snapshot().await,
        json!({"counter": {"count": 2}, "user": {"name": "ada"}})
    );
    drop(store);
    drop(plugin);

    // 5. Overwrite the counter with an old-format value and migrate it on load
    let engine = engine_for(&StorageOption::Local, &ctx).unwrap();
    engine
        .set_item("counter", r#"{"total":9,"version":1}"#)
        .await
        .unwrap();
    let migrated = PluginOptions::new()
        .keys(["counter"])
        .storage(StorageOption::Custom(Arc::clone(&engine)))
        .migration(
            MigrationStrategy::new(1, |old| json!({"count": old["total"], "version": 2}))
                .for_key("counter"),
        );
    let plugin = Arc::new(PersistencePlugin::from_options(migrated, &ctx).unwrap());
    let store = spawn(counter_config(Arc::clone(&plugin)));
    let report = plugin.hydrated().await.unwrap();
    plugin.flush().await;
    assert_eq!(report.migrations_applied, 1);
    assert_eq!(store.snapshot().await["counter"], json!({"count": 9, "version": 2}));
    let stored: serde_json::Value =
        serde_json::from_str(&engine.get_item("counter").await.unwrap().unwrap()).unwrap();
    assert_eq!(stored, json!({"count": 9, "version": 2}), "migrated value is written back");
    drop(store);
    drop(plugin);

    // 6. Live reload over session storage carries unpersisted state across
    let session = engine_for(&StorageOption::Session, &ctx).unwrap();
    let bootstrap = || {
        let ctx = ctx.clone();
        async move {
            let plugin = Arc::new(
                PersistencePlugin::from_options(
                    PluginOptions::new().key("counter").storage(StorageOption::Session),
                    &ctx,
                )
                .unwrap(),
            );
            let store = spawn(counter_config(Arc::clone(&plugin)));
            plugin.hydrated().await.unwrap();
            DemoApp { store, plugin }
        }
    };

    let first = hot_reload(bootstrap, ReloadOptions::new(), Arc::clone(&session))
        .await
        .unwrap();
    first.app().store().dispatch(Action::new("increment")).await.unwrap();
    first
        .app()
        .store()
        .dispatch(Action::with_payload("rename", json!("grace")))
        .await
        .unwrap();
    first.dispose().await.unwrap();
    assert!(session.get_item(RELOAD_SNAPSHOT_KEY).await.unwrap().is_some());

    let second = hot_reload(bootstrap, ReloadOptions::new(), Arc::clone(&session))
        .await
        .unwrap();
    let state = second.app().store().snapshot().await;
    assert_eq!(state["counter"]["count"], 1);
    assert_eq!(state["user"]["name"], "grace", "unpersisted slice came from the snapshot");
    assert!(second.lifecycle().on_init_called);
    assert_eq!(session.get_item(RELOAD_SNAPSHOT_KEY).await.unwrap(), None);
}
