//! Hash-based persistent dictionary
//!
//! Identifiers are `[type][16B hash]` where the hash is the big-endian xxh3
//! 128-bit hash of the canonical term form. Collisions are resolved by linear
//! probing: the trailing 8 bytes are treated as a big-endian counter and
//! incremented until a free (or matching) slot is found.

use super::{checked_name, DictionaryLayer, LayerStats, Resolved, Slot};
use crate::error::Result;
use crate::identifier::{Identifier, HASHED_ID_LEN};
use crate::index::BidirectionalIndex;
use crate::store::StoreFactory;
use crate::term::{Term, TermKind};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_128;

/// Probes attempted after the initial candidate before giving up
pub const MAX_COLLISION_PROBES: usize = 100;

/// Hash function over canonical term bytes
pub type HashFn = fn(&[u8]) -> u128;

/// Dictionary assigning fixed 17-byte hashed identifiers
pub struct PersistentHashLayer {
    name: String,
    hash: HashFn,
    index: Slot<BidirectionalIndex>,
    /// Serializes the check-assign-store sequence of id creation
    create_lock: Mutex<()>,
    ids_created: AtomicU64,
    collisions: AtomicU64,
    probe_exhaustions: AtomicU64,
    repairs: AtomicU64,
}

impl PersistentHashLayer {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_hash_fn(name, xxh3_128)
    }

    /// Create a layer using a custom hash function
    pub fn with_hash_fn(name: impl Into<String>, hash: HashFn) -> Result<Self> {
        let name = checked_name(name)?;
        Ok(Self {
            index: Slot::new(&name),
            name,
            hash,
            create_lock: Mutex::new(()),
            ids_created: AtomicU64::new(0),
            collisions: AtomicU64::new(0),
            probe_exhaustions: AtomicU64::new(0),
            repairs: AtomicU64::new(0),
        })
    }

    /// Number of entries currently stored
    pub fn len(&self) -> Result<usize> {
        self.index.get()?.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn initial_candidate(&self, value: &str, kind: TermKind) -> [u8; HASHED_ID_LEN] {
        let mut candidate = [0u8; HASHED_ID_LEN];
        candidate[0] = kind.marker();
        candidate[1..].copy_from_slice(&(self.hash)(value.as_bytes()).to_be_bytes());
        candidate
    }

    /// Find a slot for `value` and store it; caller holds `create_lock`
    fn assign(
        &self,
        index: &BidirectionalIndex,
        value: &str,
        kind: TermKind,
    ) -> Result<Identifier> {
        let mut candidate = self.initial_candidate(value, kind);
        let mut probes = 0;

        loop {
            match index.get_value(&candidate)? {
                None => {
                    index.put_entry(value, &candidate)?;
                    self.ids_created.fetch_add(1, Ordering::Relaxed);
                    debug!(layer = %self.name, probes, "Assigned identifier to {}", value);
                    return Ok(Identifier::from(&candidate[..]));
                }
                Some(existing) if existing == value => {
                    // id→value survived a crash without its value→id entry
                    warn!(layer = %self.name, "Repairing orphaned index entry for {}", value);
                    index.put_value_entry(value, &candidate)?;
                    self.repairs.fetch_add(1, Ordering::Relaxed);
                    return Ok(Identifier::from(&candidate[..]));
                }
                Some(_) => {}
            }

            if probes == MAX_COLLISION_PROBES {
                break;
            }
            probes += 1;
            self.collisions.fetch_add(1, Ordering::Relaxed);
            increment_probe_counter(&mut candidate);
        }

        // Aliasing risk: the slot already belongs to another value.
        warn!(
            layer = %self.name,
            "Collision resolution exhausted after {} probes for {}, reusing identifier",
            MAX_COLLISION_PROBES,
            value
        );
        self.probe_exhaustions.fetch_add(1, Ordering::Relaxed);
        index.put_entry(value, &candidate)?;
        Ok(Identifier::from(&candidate[..]))
    }

    fn has_kind(id: &[u8], kind: TermKind) -> bool {
        id.len() == HASHED_ID_LEN && id[0] == kind.marker()
    }
}

/// Add one to the trailing 8 bytes, read as a big-endian counter
fn increment_probe_counter(candidate: &mut [u8; HASHED_ID_LEN]) {
    let tail = HASHED_ID_LEN - 8;
    let mut counter = [0u8; 8];
    counter.copy_from_slice(&candidate[tail..]);
    let next = u64::from_be_bytes(counter).wrapping_add(1);
    candidate[tail..].copy_from_slice(&next.to_be_bytes());
}

impl DictionaryLayer for PersistentHashLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_id(&self, term: &Term, _predicate: bool) -> Result<Resolved<Identifier>> {
        term.validate()?;
        let index = self.index.get()?;
        let value = term.canonical_form();

        if let Some(id) = index.get(&value)? {
            return Ok(Resolved::first_level(id));
        }

        let _guard = self.create_lock.lock();

        // Double-check (another thread might have created it)
        if let Some(id) = index.get(&value)? {
            return Ok(Resolved::first_level(id));
        }

        self.assign(&index, &value, term.kind())
            .map(Resolved::first_level)
    }

    fn get_value(&self, id: &[u8], _predicate: bool) -> Result<Option<Resolved<Term>>> {
        match self.index.get()?.get_value(id)? {
            Some(value) => Ok(Some(Resolved::first_level(Term::parse_canonical(&value)?))),
            None => Ok(None),
        }
    }

    fn remove_value(&self, term: &Term, _predicate: bool) -> Result<()> {
        let index = self.index.get()?;
        let _guard = self.create_lock.lock();
        index.remove(&term.canonical_form())?;
        Ok(())
    }

    fn is_resource(&self, id: &[u8]) -> bool {
        Self::has_kind(id, TermKind::Resource)
    }

    fn is_bnode(&self, id: &[u8]) -> bool {
        Self::has_kind(id, TermKind::BlankNode)
    }

    fn is_literal(&self, id: &[u8]) -> bool {
        Self::has_kind(id, TermKind::Literal)
    }

    fn initialise(&self, factory: &dyn StoreFactory) -> Result<()> {
        let index = BidirectionalIndex::open(factory, &self.name)?;
        info!(layer = %self.name, entries = index.len()?, "Initialised hashed dictionary");
        self.index.set(index);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(index) = self.index.take() {
            index.flush()?;
            info!(layer = %self.name, "Closed hashed dictionary");
        }
        Ok(())
    }

    fn collect_stats(&self, out: &mut Vec<LayerStats>) {
        out.push(
            LayerStats::new(&self.name)
                .with_counter("ids_created", self.ids_created.load(Ordering::Relaxed))
                .with_counter("collisions", self.collisions.load(Ordering::Relaxed))
                .with_counter(
                    "probe_exhaustions",
                    self.probe_exhaustions.load(Ordering::Relaxed),
                )
                .with_counter("repairs", self.repairs.load(Ordering::Relaxed)),
        );
    }
}
