//! Durable session storage.
//!
//! The client mirrors the parts of a session that must survive a restart
//! (the refresh credential and the cached identity) into a key/value store.
//! Storage is best-effort: implementations log failures instead of
//! returning them, so session bookkeeping never fails because of it.

use std::collections::HashMap;
use std::sync::Mutex;

/// Slot holding the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Slot holding the cached identity as JSON.
pub const IDENTITY_KEY: &str = "user";

/// A string key/value store that outlives the process.
pub trait SessionStorage: Send + Sync {
    /// Read a slot.
    fn load(&self, key: &str) -> Option<String>;

    /// Write a slot, replacing any previous value.
    fn store(&self, key: &str, value: &str);

    /// Remove a slot. Removing an absent slot is not an error.
    fn remove(&self, key: &str);
}

/// In-memory storage, useful for tests and for sessions that should not persist.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no slot is populated.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().map(|s| s.is_empty()).unwrap_or(true)
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<String> {
        self.slots.lock().ok()?.get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(key);
        }
    }
}
