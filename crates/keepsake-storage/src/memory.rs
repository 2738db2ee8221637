// ABOUTME: In-memory key/value backend used as the session-scoped store.
// ABOUTME: Shared behind an Arc so its contents outlive a single store instance.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::engine::{StorageBackend, StorageError};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn length(&self) -> Result<usize, StorageError> {
        Ok(self.items.lock().map_err(|_| StorageError::Poisoned)?.len())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.items.lock().map_err(|_| StorageError::Poisoned)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_existing_value() {
        let store = MemoryStorage::new();
        store.set_item("k", "one").unwrap();
        store.set_item("k", "two").unwrap();

        assert_eq!(store.length().unwrap(), 1);
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn remove_missing_key_is_not_an_error() {
        let store = MemoryStorage::new();
        store.remove_item("missing").unwrap();
        assert_eq!(store.get_item("missing").unwrap(), None);
    }
}
