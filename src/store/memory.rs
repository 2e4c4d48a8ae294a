//! In-process tree, used for `memory://` runs and tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::{paths, TelemetryStore, FEED_CAPACITY};
use crate::error::StoreError;
use crate::models::RawSnapshot;
use crate::settings::Settings;

// ---

#[derive(Debug, Default)]
pub struct MemoryStore {
    tree: Mutex<Map<String, Value>>,
    subscribers: Mutex<Vec<mpsc::Sender<RawSnapshot>>>,
    writes: Mutex<Vec<(String, Value)>>,
    failing: Mutex<HashSet<String>>,
    subscriptions: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge the others.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the reference test snapshot.
    pub fn with_test_data() -> Self {
        // ---
        let store = Self::new();
        store.merge(&RawSnapshot::test_data());
        store
    }

    fn merge(&self, snapshot: &RawSnapshot) {
        // ---
        if let Ok(Value::Object(map)) = serde_json::to_value(snapshot) {
            lock(&self.tree).extend(map);
        }
    }

    fn root_snapshot(&self) -> Option<RawSnapshot> {
        // ---
        let tree = lock(&self.tree);
        if tree.is_empty() {
            return None;
        }
        serde_json::from_value(Value::Object(tree.clone())).ok()
    }

    /// Merge `snapshot` into the tree, then deliver it to every live
    /// subscriber. Returns how many received it.
    pub fn publish(&self, snapshot: RawSnapshot) -> usize {
        // ---
        self.merge(&snapshot);

        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers
            .iter()
            .filter(|tx| tx.try_send(snapshot.clone()).is_ok())
            .count()
    }

    /// Set a raw key, e.g. `settings`.
    pub fn set(&self, path: &str, value: Value) {
        lock(&self.tree).insert(path.to_string(), value);
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        lock(&self.tree).get(path).cloned()
    }

    /// Every acknowledged write, in completion order.
    pub fn writes(&self) -> Vec<(String, Value)> {
        lock(&self.writes).clone()
    }

    /// Make writes to `path` fail until cleared.
    pub fn fail_writes_to(&self, path: &str) {
        lock(&self.failing).insert(path.to_string());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Number of times `subscribe` was called.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn subscribe(&self) -> Result<mpsc::Receiver<RawSnapshot>, StoreError> {
        // ---
        self.subscriptions.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        if let Some(current) = self.root_snapshot() {
            let _ = tx.try_send(current);
        }
        lock(&self.subscribers).push(tx);
        Ok(rx)
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        // ---
        if lock(&self.failing).contains(path) {
            return Err(StoreError::Refused(path.to_string()));
        }

        lock(&self.tree).insert(path.to_string(), value.clone());
        lock(&self.writes).push((path.to_string(), value));
        Ok(())
    }

    async fn read_settings(&self) -> Result<Settings, StoreError> {
        // ---
        match self.get(paths::SETTINGS) {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Settings::default()),
        }
    }

    async fn seed(&self, snapshot: &RawSnapshot) -> Result<(), StoreError> {
        self.merge(snapshot);
        Ok(())
    }
}
