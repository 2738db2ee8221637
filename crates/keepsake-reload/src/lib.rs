// ABOUTME: Live-reload support for keepsake stores: capture state before teardown, restore it after re-bootstrap.
// ABOUTME: Snapshots live in a single storage slot that is cleared once the new instance has consumed it.

pub mod manager;
pub mod snapshot;

pub use manager::{
    AfterOnInit, LifecycleStatus, ReloadError, ReloadOptions, ReloadPhase, ReloadSnapshotManager,
    ReloadableApp, hot_reload,
};
pub use snapshot::{RELOAD_SNAPSHOT_KEY, SnapshotStorage};
