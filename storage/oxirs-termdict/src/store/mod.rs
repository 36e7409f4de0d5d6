//! Backing store collaborator
//!
//! The dictionary treats its backing store as an opaque ordered key-value map.
//! Every storage-owning layer opens its maps by name from a [`StoreFactory`]
//! during `initialise`.

pub mod file;
pub mod memory;

pub use file::{FileStore, FileStoreFactory};
pub use memory::{MemoryStore, MemoryStoreFactory};

use crate::error::Result;
use std::sync::Arc;

/// Ordered key-value map used as persistent storage
pub trait KvStore: Send + Sync {
    /// Value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite `key`
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn delete(&self, key: &[u8]) -> Result<()>;

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries in key order
    fn scan(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Make previous writes durable
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens named key-value maps
pub trait StoreFactory: Send + Sync {
    /// Open (or create) the map called `name`
    ///
    /// Opening the same name twice yields the same underlying map.
    fn open(&self, name: &str) -> Result<Arc<dyn KvStore>>;
}
