//! Port to the remote key/value tree the device mirrors its state into.
//!
//! The orchestrator only sees [`TelemetryStore`]; `rest` talks to a
//! Firebase-style REST endpoint and `memory` keeps the tree in-process.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::models::RawSnapshot;
use crate::settings::Settings;

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

// ---

/// Snapshot feed buffer; a slow consumer backs up the producer.
pub(crate) const FEED_CAPACITY: usize = 16;

/// Tree paths written by commands.
pub mod paths {
    pub const DRY_FAN: &str = "dry-fan";
    pub const WET_FAN: &str = "wet-fan";
    pub const PUMP: &str = "pump";
    pub const OPTIMAL: &str = "optimal";
    pub const SETTINGS: &str = "settings";
}

#[async_trait]
pub trait TelemetryStore: Send + Sync + 'static {
    /// Open a feed of whole-tree snapshots. The first delivery is the current
    /// tree. The feed ends when the receiver is dropped.
    async fn subscribe(&self) -> Result<mpsc::Receiver<RawSnapshot>, StoreError>;

    /// Write one value at `path` and wait for the acknowledgement.
    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Read the `settings` subtree. Missing fields take their defaults.
    async fn read_settings(&self) -> Result<Settings, StoreError>;

    /// Write every key of `snapshot` at the root; other keys are left alone.
    async fn seed(&self, snapshot: &RawSnapshot) -> Result<(), StoreError>;
}
