// ABOUTME: Persistence layer for keepsake: storage engines, codecs, migrations, and the persistence plugin.
// ABOUTME: Keeps selected state slices in a key/value store and restores them when a store boots.

pub mod codec;
pub mod engine;
pub mod memory;
pub mod migration;
pub mod options;
pub mod plugin;
pub mod sqlite;

pub use codec::{CodecError, JsonCodec, StateCodec};
pub use engine::{
    LOCAL_STORE_FILE, SimpleAsyncStorage, StorageBackend, StorageContext, StorageEngine,
    StorageError, StorageOption, engine_for,
};
pub use memory::MemoryStorage;
pub use migration::{MigrationOutcome, MigrationRegistry, MigrationStrategy};
pub use options::{PluginOptions, ROOT_STATE_KEY};
pub use plugin::{HydrationReport, PersistError, PersistencePlugin};
pub use sqlite::SqliteStorage;
