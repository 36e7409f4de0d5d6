//! Dictionary layers
//!
//! A dictionary is a chain of layers. Each layer implements
//! [`DictionaryLayer`] and owns the layer(s) below it, so the chain is wired
//! once at startup and then shared read-only between threads.
//!
//! Results travel back up the chain tagged with [`Resolved::first_level`],
//! telling cache layers whether the value was produced by the layer directly
//! below them or served by a deeper cache.

pub mod cache;
pub mod counter;
pub mod hashed;
pub mod known_vocabulary;
pub mod long_value;
pub mod tiered;

pub use cache::{CacheLayer, CacheStats, CacheStrategy};
pub use counter::CounterLayer;
pub use hashed::{PersistentHashLayer, MAX_COLLISION_PROBES};
pub use known_vocabulary::{KnownVocabularyLayer, DEFAULT_KNOWN_NAMESPACES};
pub use long_value::{LongValueLayer, DEFAULT_LONG_VALUE_THRESHOLD};
pub use tiered::TieredSplitLayer;

use crate::error::{DictError, Result};
use crate::identifier::Identifier;
use crate::store::StoreFactory;
use crate::term::Term;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A value returned by a layer together with its origin tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    /// Produced by the returning layer itself rather than a deeper cache
    pub first_level: bool,
}

impl<T> Resolved<T> {
    pub fn first_level(value: T) -> Self {
        Self {
            value,
            first_level: true,
        }
    }

    pub fn deeper(value: T) -> Self {
        Self {
            value,
            first_level: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            first_level: self.first_level,
        }
    }
}

/// Counters exported by a layer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerStats {
    pub layer: String,
    pub counters: BTreeMap<String, u64>,
    pub ratios: BTreeMap<String, f64>,
}

impl LayerStats {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            ..Default::default()
        }
    }

    pub fn with_counter(mut self, name: &str, value: u64) -> Self {
        self.counters.insert(name.to_string(), value);
        self
    }

    pub fn with_ratio(mut self, name: &str, value: f64) -> Self {
        self.ratios.insert(name.to_string(), value);
        self
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn ratio(&self, name: &str) -> f64 {
        self.ratios.get(name).copied().unwrap_or(0.0)
    }
}

/// One layer of the term dictionary chain
pub trait DictionaryLayer: Send + Sync {
    /// Layer name, also the prefix of the store names it opens
    fn name(&self) -> &str;

    /// Identifier of `term`, created on first use
    fn get_id(&self, term: &Term, predicate: bool) -> Result<Resolved<Identifier>>;

    /// Term behind `id`, `None` when the identifier is unknown
    fn get_value(&self, id: &[u8], predicate: bool) -> Result<Option<Resolved<Term>>>;

    /// Forget `term`
    fn remove_value(&self, term: &Term, predicate: bool) -> Result<()>;

    /// Whether `id` denotes an IRI
    ///
    /// Classification inspects identifier bytes only and never touches storage.
    fn is_resource(&self, id: &[u8]) -> bool;

    fn is_bnode(&self, id: &[u8]) -> bool;

    fn is_literal(&self, id: &[u8]) -> bool;

    /// Open storage for this layer and every layer below it
    fn initialise(&self, factory: &dyn StoreFactory) -> Result<()>;

    /// Release storage for this layer and every layer below it
    fn close(&self) -> Result<()>;

    /// Append the counters of this layer and the layers below it
    fn collect_stats(&self, out: &mut Vec<LayerStats>);
}

/// Reject empty layer names at construction time
pub(crate) fn checked_name(name: impl Into<String>) -> Result<String> {
    let name = name.into();
    if name.trim().is_empty() {
        return Err(DictError::construction("layer name must not be empty"));
    }
    Ok(name)
}

/// Storage handle that exists between `initialise` and `close`
pub(crate) struct Slot<T> {
    layer: String,
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> Slot<T> {
    pub(crate) fn new(layer: &str) -> Self {
        Self {
            layer: layer.to_string(),
            inner: RwLock::new(None),
        }
    }

    pub(crate) fn set(&self, value: T) {
        *self.inner.write() = Some(Arc::new(value));
    }

    pub(crate) fn get(&self) -> Result<Arc<T>> {
        self.inner
            .read()
            .clone()
            .ok_or_else(|| DictError::not_initialised(&self.layer))
    }

    pub(crate) fn take(&self) -> Option<Arc<T>> {
        self.inner.write().take()
    }
}

/// Close every layer, reporting the first failure
pub(crate) fn close_all(layers: &[&dyn DictionaryLayer]) -> Result<()> {
    let mut first_error = None;
    for layer in layers {
        if let Err(e) = layer.close() {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared helpers for layer tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Call counters of a [`CountingLayer`]
    #[derive(Debug, Default)]
    pub struct CallCounts {
        pub get_id: AtomicUsize,
        pub get_value: AtomicUsize,
        pub remove_value: AtomicUsize,
    }

    impl CallCounts {
        pub fn get_id(&self) -> usize {
            self.get_id.load(Ordering::SeqCst)
        }

        pub fn get_value(&self) -> usize {
            self.get_value.load(Ordering::SeqCst)
        }

        pub fn remove_value(&self) -> usize {
            self.remove_value.load(Ordering::SeqCst)
        }
    }

    /// Layer wrapper counting the calls made into `inner`
    pub struct CountingLayer {
        inner: Box<dyn DictionaryLayer>,
        counts: Arc<CallCounts>,
        first_level: Option<bool>,
    }

    impl CountingLayer {
        pub fn wrap(inner: Box<dyn DictionaryLayer>) -> (Self, Arc<CallCounts>) {
            let counts = Arc::new(CallCounts::default());
            (
                Self {
                    inner,
                    counts: counts.clone(),
                    first_level: None,
                },
                counts,
            )
        }

        /// Override the origin tag of every result
        pub fn tagging(mut self, first_level: bool) -> Self {
            self.first_level = Some(first_level);
            self
        }

        fn tag<T>(&self, mut resolved: Resolved<T>) -> Resolved<T> {
            if let Some(first_level) = self.first_level {
                resolved.first_level = first_level;
            }
            resolved
        }
    }

    impl DictionaryLayer for CountingLayer {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn get_id(&self, term: &Term, predicate: bool) -> Result<Resolved<Identifier>> {
            self.counts.get_id.fetch_add(1, Ordering::SeqCst);
            Ok(self.tag(self.inner.get_id(term, predicate)?))
        }

        fn get_value(&self, id: &[u8], predicate: bool) -> Result<Option<Resolved<Term>>> {
            self.counts.get_value.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.get_value(id, predicate)?.map(|r| self.tag(r)))
        }

        fn remove_value(&self, term: &Term, predicate: bool) -> Result<()> {
            self.counts.remove_value.fetch_add(1, Ordering::SeqCst);
            self.inner.remove_value(term, predicate)
        }

        fn is_resource(&self, id: &[u8]) -> bool {
            self.inner.is_resource(id)
        }

        fn is_bnode(&self, id: &[u8]) -> bool {
            self.inner.is_bnode(id)
        }

        fn is_literal(&self, id: &[u8]) -> bool {
            self.inner.is_literal(id)
        }

        fn initialise(&self, factory: &dyn StoreFactory) -> Result<()> {
            self.inner.initialise(factory)
        }

        fn close(&self) -> Result<()> {
            self.inner.close()
        }

        fn collect_stats(&self, out: &mut Vec<LayerStats>) {
            self.inner.collect_stats(out)
        }
    }
}
