//! Per-request execution context.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A per-request key/value store shared by every field resolution of one request.
///
/// Cloning yields another handle to the same store. Values are kept as JSON
/// and converted with serde on access, so handlers and the pre-execution hook
/// can exchange typed values without sharing Rust types.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    data: Arc<RwLock<HashMap<String, Value>>>,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded with a snapshot.
    pub fn from_snapshot(snapshot: HashMap<String, Value>) -> Self {
        Self {
            data: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Sets a value. Values that fail to serialize are stored as null.
    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.write().insert(key.into(), value);
    }

    /// Gets a value, converting it to `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.data.read();
        data.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets the raw stored value.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Removes a value, returning it.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copies the current contents.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.data.read().clone()
    }

    /// Returns true if both handles point at the same store.
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("data", &*self.data.read())
            .finish()
    }
}
