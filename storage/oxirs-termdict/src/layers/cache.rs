//! Bounded LRU caching layer
//!
//! Keeps two independent LRU maps, identifier → term and term → identifier,
//! each with its own capacity and eviction counter. Several cache layers can
//! be stacked in one chain; the [`CacheStrategy`] decides which results a
//! given layer keeps.

use super::{checked_name, DictionaryLayer, LayerStats, Resolved};
use crate::error::{DictError, Result};
use crate::identifier::Identifier;
use crate::store::StoreFactory;
use crate::term::Term;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Which results a cache layer keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Only results produced by the layer directly below
    FirstLevel,
    /// Every result
    Cumulative,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub id_lookups: u64,
    pub id_hits: u64,
    pub id_evictions: u64,
    pub id_entries: usize,
    pub id_capacity: usize,
    pub value_lookups: u64,
    pub value_hits: u64,
    pub value_evictions: u64,
    pub value_entries: usize,
    pub value_capacity: usize,
}

impl CacheStats {
    /// Hit ratio of identifier → term lookups
    pub fn id_hit_ratio(&self) -> f64 {
        ratio(self.id_hits, self.id_lookups)
    }

    /// Hit ratio of term → identifier lookups
    pub fn value_hit_ratio(&self) -> f64 {
        ratio(self.value_hits, self.value_lookups)
    }
}

fn ratio(hits: u64, lookups: u64) -> f64 {
    if hits == 0 || lookups == 0 {
        0.0
    } else {
        hits as f64 / lookups as f64
    }
}

#[derive(Debug, Default)]
struct Counters {
    lookups: AtomicU64,
    hits: AtomicU64,
    evictions: AtomicU64,
}

/// One bounded LRU map with its counters
struct BoundedCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, V>>,
    counters: Counters,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    fn lookup(&self, key: &K) -> Option<V> {
        self.counters.lookups.fetch_add(1, Ordering::Relaxed);
        let hit = self.entries.lock().get(key).cloned();
        if hit.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        let replaces = entries.contains(&key);
        if entries.push(key, value).is_some() && !replaces {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().pop(key)
    }

    fn remove_where(&self, matches: impl Fn(&V) -> bool)
    where
        K: Clone,
    {
        let mut entries = self.entries.lock();
        let keys: Vec<K> = entries
            .iter()
            .filter(|(_, v)| matches(v))
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            entries.pop(&key);
        }
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

/// Dictionary layer caching lookups of the layer below
///
/// Identifiers do not depend on the predicate flag, so neither map keys on it.
pub struct CacheLayer {
    name: String,
    strategy: CacheStrategy,
    next: Box<dyn DictionaryLayer>,
    /// identifier → term
    id_cache: BoundedCache<Identifier, Term>,
    /// term → identifier
    value_cache: BoundedCache<Term, Identifier>,
}

impl CacheLayer {
    pub fn new(
        name: impl Into<String>,
        strategy: CacheStrategy,
        id_capacity: usize,
        value_capacity: usize,
        next: Box<dyn DictionaryLayer>,
    ) -> Result<Self> {
        let name = checked_name(name)?;
        let id_capacity = NonZeroUsize::new(id_capacity).ok_or_else(|| {
            DictError::construction(format!("cache '{name}' needs a non-zero id capacity"))
        })?;
        let value_capacity = NonZeroUsize::new(value_capacity).ok_or_else(|| {
            DictError::construction(format!("cache '{name}' needs a non-zero value capacity"))
        })?;

        Ok(Self {
            name,
            strategy,
            next,
            id_cache: BoundedCache::new(id_capacity),
            value_cache: BoundedCache::new(value_capacity),
        })
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            id_lookups: self.id_cache.counters.lookups.load(Ordering::Relaxed),
            id_hits: self.id_cache.counters.hits.load(Ordering::Relaxed),
            id_evictions: self.id_cache.counters.evictions.load(Ordering::Relaxed),
            id_entries: self.id_cache.len(),
            id_capacity: self.id_cache.capacity(),
            value_lookups: self.value_cache.counters.lookups.load(Ordering::Relaxed),
            value_hits: self.value_cache.counters.hits.load(Ordering::Relaxed),
            value_evictions: self.value_cache.counters.evictions.load(Ordering::Relaxed),
            value_entries: self.value_cache.len(),
            value_capacity: self.value_cache.capacity(),
        }
    }

    fn keeps<T>(&self, resolved: &Resolved<T>) -> bool {
        match self.strategy {
            CacheStrategy::Cumulative => true,
            CacheStrategy::FirstLevel => resolved.first_level,
        }
    }

    fn remember(&self, term: Term, id: Identifier) {
        self.id_cache.insert(id.clone(), term.clone());
        self.value_cache.insert(term, id);
    }
}

impl DictionaryLayer for CacheLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_id(&self, term: &Term, predicate: bool) -> Result<Resolved<Identifier>> {
        if let Some(id) = self.value_cache.lookup(term) {
            return Ok(Resolved::deeper(id));
        }

        let resolved = self.next.get_id(term, predicate)?;
        if self.keeps(&resolved) {
            self.remember(term.clone(), resolved.value.clone());
        }

        // Results leave a cache layer untagged
        Ok(Resolved::deeper(resolved.value))
    }

    fn get_value(&self, id: &[u8], predicate: bool) -> Result<Option<Resolved<Term>>> {
        let key = Identifier::from(id);
        if let Some(term) = self.id_cache.lookup(&key) {
            return Ok(Some(Resolved::deeper(term)));
        }

        let Some(resolved) = self.next.get_value(id, predicate)? else {
            return Ok(None);
        };
        if self.keeps(&resolved) {
            self.remember(resolved.value.clone(), key);
        }

        Ok(Some(Resolved::deeper(resolved.value)))
    }

    fn remove_value(&self, term: &Term, predicate: bool) -> Result<()> {
        match self.value_cache.remove(term) {
            Some(id) => {
                self.id_cache.remove(&id);
            }
            None => self.id_cache.remove_where(|cached| cached == term),
        }
        self.next.remove_value(term, predicate)
    }

    fn is_resource(&self, id: &[u8]) -> bool {
        self.next.is_resource(id)
    }

    fn is_bnode(&self, id: &[u8]) -> bool {
        self.next.is_bnode(id)
    }

    fn is_literal(&self, id: &[u8]) -> bool {
        self.next.is_literal(id)
    }

    fn initialise(&self, factory: &dyn StoreFactory) -> Result<()> {
        self.next.initialise(factory)
    }

    fn close(&self) -> Result<()> {
        self.id_cache.clear();
        self.value_cache.clear();
        debug!(layer = %self.name, "Cleared caches");
        self.next.close()
    }

    fn collect_stats(&self, out: &mut Vec<LayerStats>) {
        let stats = self.cache_stats();
        out.push(
            LayerStats::new(&self.name)
                .with_counter("id_lookups", stats.id_lookups)
                .with_counter("id_hits", stats.id_hits)
                .with_counter("id_evictions", stats.id_evictions)
                .with_counter("id_entries", stats.id_entries as u64)
                .with_counter("value_lookups", stats.value_lookups)
                .with_counter("value_hits", stats.value_hits)
                .with_counter("value_evictions", stats.value_evictions)
                .with_counter("value_entries", stats.value_entries as u64)
                .with_ratio("id_hit_ratio", stats.id_hit_ratio())
                .with_ratio("value_hit_ratio", stats.value_hit_ratio()),
        );
        self.next.collect_stats(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::testing::{CallCounts, CountingLayer};
    use crate::layers::PersistentHashLayer;
    use crate::store::MemoryStoreFactory;
    use std::sync::Arc;

    fn create_test_cache(
        strategy: CacheStrategy,
        capacity: usize,
        first_level: bool,
    ) -> (CacheLayer, Arc<CallCounts>) {
        let (next, counts) =
            CountingLayer::wrap(Box::new(PersistentHashLayer::new("cached").unwrap()));
        let cache = CacheLayer::new(
            "cache",
            strategy,
            capacity,
            capacity,
            Box::new(next.tagging(first_level)),
        )
        .unwrap();
        cache.initialise(&MemoryStoreFactory::new()).unwrap();
        (cache, counts)
    }

    #[test]
    fn test_second_lookup_skips_decoratee() -> Result<()> {
        let (cache, counts) = create_test_cache(CacheStrategy::Cumulative, 10, false);

        let term = Term::iri("http://example.org/cached");
        let first = cache.get_id(&term, false)?;
        let second = cache.get_id(&term, false)?;

        assert_eq!(first.value, second.value);
        assert!(!first.first_level && !second.first_level);
        assert_eq!(counts.get_id(), 1);

        // The reverse direction was learned as well
        assert_eq!(
            cache.get_value(&first.value, false)?.map(Resolved::into_value),
            Some(term)
        );
        assert_eq!(counts.get_value(), 0);

        let stats = cache.cache_stats();
        assert_eq!(stats.value_lookups, 2);
        assert_eq!(stats.value_hits, 1);
        assert_eq!(stats.id_hits, 1);
        assert_eq!(stats.value_hit_ratio(), 0.5);

        Ok(())
    }

    #[test]
    fn test_first_level_strategy_respects_tag() -> Result<()> {
        let (deep, counts) = create_test_cache(CacheStrategy::FirstLevel, 10, false);
        let term = Term::literal("served by a deeper cache");
        deep.get_id(&term, false)?;
        deep.get_id(&term, false)?;
        assert_eq!(counts.get_id(), 2);
        assert_eq!(deep.cache_stats().value_entries, 0);

        let (direct, counts) = create_test_cache(CacheStrategy::FirstLevel, 10, true);
        direct.get_id(&term, false)?;
        direct.get_id(&term, false)?;
        assert_eq!(counts.get_id(), 1);

        Ok(())
    }

    #[test]
    fn test_each_eviction_counted_once() -> Result<()> {
        let (cache, _counts) = create_test_cache(CacheStrategy::Cumulative, 2, true);

        for i in 0..5 {
            cache.get_id(&Term::literal(format!("v{i}")), false)?;
        }
        // Re-inserting a present key is not an eviction
        cache.get_id(&Term::literal("v4"), false)?;

        let stats = cache.cache_stats();
        assert_eq!(stats.value_evictions, 3);
        assert_eq!(stats.id_evictions, 3);
        assert_eq!(stats.value_entries, 2);

        Ok(())
    }

    #[test]
    fn test_evicted_entry_hits_decoratee_again() -> Result<()> {
        let (cache, counts) = create_test_cache(CacheStrategy::Cumulative, 1, true);

        let a = Term::literal("a");
        let b = Term::literal("b");
        cache.get_id(&a, false)?;
        cache.get_id(&b, false)?;
        cache.get_id(&a, false)?;

        assert_eq!(counts.get_id(), 3);

        Ok(())
    }

    #[test]
    fn test_remove_invalidates_both_maps() -> Result<()> {
        let (cache, counts) = create_test_cache(CacheStrategy::Cumulative, 10, true);

        let term = Term::blank_node("b0");
        let id = cache.get_id(&term, false)?.value;
        cache.remove_value(&term, false)?;

        assert_eq!(counts.remove_value(), 1);
        assert_eq!(cache.get_value(&id, false)?, None);
        assert_eq!(counts.get_value(), 1);

        Ok(())
    }

    #[test]
    fn test_remove_clears_reverse_only_entries() -> Result<()> {
        let cache = CacheLayer::new(
            "cache",
            CacheStrategy::Cumulative,
            10,
            1,
            Box::new(PersistentHashLayer::new("cached")?),
        )?;
        cache.initialise(&MemoryStoreFactory::new())?;

        let kept = Term::literal("kept");
        let id = cache.get_id(&kept, false)?.value;
        // Evicts `kept` from the value map, the reverse entry stays
        cache.get_id(&Term::literal("other"), false)?;
        assert_eq!(cache.cache_stats().id_entries, 2);

        cache.remove_value(&kept, false)?;
        assert_eq!(cache.cache_stats().id_entries, 1);
        assert_eq!(cache.get_value(&id, false)?, None);

        Ok(())
    }

    #[test]
    fn test_hit_ratio_without_lookups() {
        assert_eq!(CacheStats::default().id_hit_ratio(), 0.0);
        assert_eq!(CacheStats::default().value_hit_ratio(), 0.0);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let next = PersistentHashLayer::new("x").unwrap();
        assert!(matches!(
            CacheLayer::new("cache", CacheStrategy::Cumulative, 0, 10, Box::new(next)),
            Err(DictError::Construction(_))
        ));
    }
}
