use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{Partition, PersistentStore};
use crate::error::StoreError;

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(Partition, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, partition: Partition, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let entries = self.entries.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                entries
                    .get(&(partition, key.to_string()))
                    .map(|v| (key.to_string(), v.clone()))
            })
            .collect())
    }

    fn set(&self, partition: Partition, new_entries: Map<String, Value>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock()?;
        for (key, value) in new_entries {
            entries.insert((partition, key), value);
        }
        Ok(())
    }
}
