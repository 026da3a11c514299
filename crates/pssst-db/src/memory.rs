use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;

use pssst_types::UserRecord;

use crate::Store;

/// Volatile store for tests and throwaway relays.
///
/// Records are kept in their JSON form so that every `get` hands out a fresh
/// copy, the same as a real backend would.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<UserRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;

        records
            .get(name)
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .transpose()
    }

    fn set(&self, name: &str, record: &UserRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.records
            .lock()
            .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?
            .insert(name.to_string(), json);
        Ok(())
    }
}
