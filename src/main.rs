// ABOUTME: Entry point for the keepsake binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and drives a demo counter store against configured storage.

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use keepsake_core::{Action, ActionRegistry, StateDefinition, StoreConfig, spawn};
use keepsake_storage::{PersistencePlugin, StorageContext, StorageEngine, engine_for};
use serde_json::json;

use crate::config::KeepsakeConfig;

#[derive(Debug, Parser)]
#[command(name = "keepsake", version, about = "Persisted state store demo")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bootstrap the counter store, dispatch increments, and print the state.
    Run {
        #[arg(long, default_value_t = 1)]
        increments: u32,

        /// Storage key to persist; repeat for several. Overrides KEEPSAKE_KEYS.
        #[arg(long = "key")]
        keys: Vec<String>,
    },
    /// Print the raw value stored under a key.
    Inspect { key: String },
    /// Remove every stored key.
    Clear,
}

fn counter_store_config(plugin: Arc<PersistencePlugin>) -> StoreConfig {
    let mut registry = ActionRegistry::new();
    registry.on("increment", "counter", |slice, payload| {
        let step = payload.as_i64().unwrap_or(1);
        let count = slice["count"].as_i64().unwrap_or(0);
        slice["count"] = json!(count + step);
    });
    StoreConfig::new(registry)
        .state(StateDefinition::new("counter", json!({"count": 0})))
        .plugin(plugin)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keepsake=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = KeepsakeConfig::from_env()?;
    let ctx = StorageContext::new(config.home.clone());
    tracing::info!("keepsake starting with {:?} storage in {}", config.storage, config.home.display());

    match cli.command {
        Command::Run { increments, keys } => {
            let plugin = Arc::new(
                PersistencePlugin::from_options(config.plugin_options(&keys), &ctx)
                    .context("failed to open storage")?,
            );
            let store = spawn(counter_store_config(Arc::clone(&plugin)));

            let report = plugin.hydrated().await?;
            tracing::info!(
                "restored {:?}, skipped {:?}, {} migration(s) applied",
                report.restored,
                report.skipped,
                report.migrations_applied
            );

            for _ in 0..increments {
                store.dispatch(Action::new("increment")).await?;
            }
            plugin.flush().await;

            println!("{}", serde_json::to_string_pretty(&store.snapshot().await)?);
        }
        Command::Inspect { key } => {
            let engine = engine_for(&config.storage, &ctx)?;
            match engine.get_item(&key).await? {
                Some(raw) => println!("{}", raw),
                None => println!("{} is not stored", key),
            }
        }
        Command::Clear => {
            let engine = engine_for(&config.storage, &ctx)?;
            let removed = engine.length().await?;
            engine.clear().await?;
            println!("removed {} stored key(s)", removed);
        }
    }

    Ok(())
}
