use anyhow::Result;
use std::path::Path;

use super::Sink;
use crate::store::Store;

/// Sink backed by the native store; put/close map 1:1 onto the store.
pub struct StoreSink {
    store: Store,
}

impl StoreSink {
    pub fn create(root: &Path, fsync: bool) -> Result<Self> {
        Ok(Self {
            store: Store::create(root, fsync)?,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl Sink for StoreSink {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.store.put(key, value)
    }

    fn close(&mut self) -> Result<()> {
        self.store.close()
    }

    fn kind(&self) -> &'static str {
        "native"
    }
}
