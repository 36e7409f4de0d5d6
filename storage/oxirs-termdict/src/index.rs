//! Bidirectional value ↔ identifier index
//!
//! Two independent maps kept in sync by the caller:
//! - by_value: canonical term form → identifier
//! - by_id: identifier → canonical term form
//!
//! The two writes of an entry are not atomic. Writes go id→value first and
//! removals drop value→id first, so a crash in between can only leave an
//! orphaned id→value entry, never a value→id entry without its reverse.
//! [`crate::layers::PersistentHashLayer`] repairs such orphans when it meets
//! them again.

use crate::error::{DictError, Result};
use crate::identifier::Identifier;
use crate::store::{KvStore, StoreFactory};
use std::sync::Arc;

/// Bidirectional mapping between canonical term forms and identifiers
pub struct BidirectionalIndex {
    by_value: Arc<dyn KvStore>,
    by_id: Arc<dyn KvStore>,
}

impl BidirectionalIndex {
    pub fn new(by_value: Arc<dyn KvStore>, by_id: Arc<dyn KvStore>) -> Self {
        Self { by_value, by_id }
    }

    /// Open `{name}_by_value` and `{name}_by_id` from `factory`
    pub fn open(factory: &dyn StoreFactory, name: &str) -> Result<Self> {
        Ok(Self::new(
            factory.open(&format!("{name}_by_value"))?,
            factory.open(&format!("{name}_by_id"))?,
        ))
    }

    /// Identifier stored for `value`
    pub fn get(&self, value: &str) -> Result<Option<Identifier>> {
        Ok(self.by_value.get(value.as_bytes())?.map(Identifier::new))
    }

    /// Value stored for `id`
    pub fn get_value(&self, id: &[u8]) -> Result<Option<String>> {
        self.by_id.get(id)?.map(decode_value).transpose()
    }

    /// Store the entry in both maps
    pub fn put_entry(&self, value: &str, id: &[u8]) -> Result<()> {
        self.by_id.put(id, value.as_bytes())?;
        self.by_value.put(value.as_bytes(), id)
    }

    /// Store only the value→id direction, used to repair orphaned entries
    pub(crate) fn put_value_entry(&self, value: &str, id: &[u8]) -> Result<()> {
        self.by_value.put(value.as_bytes(), id)
    }

    /// Whether `id` is taken
    pub fn contains(&self, id: &[u8]) -> Result<bool> {
        self.by_id.contains(id)
    }

    /// Remove `value` and its identifier, returning whether it was present
    pub fn remove(&self, value: &str) -> Result<bool> {
        match self.get(value)? {
            Some(id) => {
                self.by_value.delete(value.as_bytes())?;
                self.by_id.delete(&id)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of identifiers in use
    pub fn len(&self) -> Result<usize> {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All (value, identifier) entries in identifier order
    pub fn entries(&self) -> Result<Vec<(String, Identifier)>> {
        self.by_id
            .scan()?
            .into_iter()
            .map(|(id, value)| Ok((decode_value(value)?, Identifier::new(id))))
            .collect()
    }

    pub fn flush(&self) -> Result<()> {
        self.by_value.flush()?;
        self.by_id.flush()
    }
}

fn decode_value(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| DictError::Codec(format!("Stored value is not UTF-8: {}", e)))
}
