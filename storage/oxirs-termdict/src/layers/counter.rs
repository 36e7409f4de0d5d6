//! Sequential identifiers for IRIs
//!
//! Assigns 8-byte big-endian sequence numbers, starting at 1, to IRIs. Used
//! as the namespace dictionary of [`super::TieredSplitLayer`], whose layout
//! needs namespace identifiers of a fixed 8 bytes.

use super::{checked_name, DictionaryLayer, LayerStats, Resolved, Slot};
use crate::error::{DictError, Result};
use crate::identifier::{Identifier, NAMESPACE_ID_LEN};
use crate::index::BidirectionalIndex;
use crate::store::{KvStore, StoreFactory};
use crate::term::Term;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// First sequence number handed out
const FIRST_ID: u64 = 1;

/// Key of the persisted next sequence number in the meta map
const NEXT_ID_KEY: &[u8] = b"next_id";

struct CounterState {
    index: BidirectionalIndex,
    meta: Arc<dyn KvStore>,
}

/// Dictionary assigning sequential 8-byte identifiers to IRIs
///
/// Uses two maps plus a meta map:
/// - by_value: IRI → sequence number
/// - by_id: sequence number → IRI
/// - meta: next sequence number
pub struct CounterLayer {
    name: String,
    state: Slot<CounterState>,
    /// Next available sequence number; its lock serializes id creation
    next_id: Mutex<u64>,
    ids_created: AtomicU64,
}

impl CounterLayer {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = checked_name(name)?;
        Ok(Self {
            state: Slot::new(&name),
            name,
            next_id: Mutex::new(FIRST_ID),
            ids_created: AtomicU64::new(0),
        })
    }

    /// Number of IRIs stored
    pub fn size(&self) -> Result<usize> {
        self.state.get()?.index.len()
    }

    fn iri<'a>(&self, term: &'a Term) -> Result<&'a str> {
        term.as_iri().ok_or_else(|| {
            DictError::UnsupportedTerm(format!(
                "layer '{}' only encodes IRIs, got {}",
                self.name, term
            ))
        })
    }

    /// Next sequence number after the highest one found in the index
    fn recover_next_id(index: &BidirectionalIndex) -> Result<u64> {
        let mut next = FIRST_ID;
        for (_, id) in index.entries()? {
            let seq = decode_sequence(&id)?;
            next = next.max(seq + 1);
        }
        Ok(next)
    }
}

fn decode_sequence(bytes: &[u8]) -> Result<u64> {
    let array: [u8; NAMESPACE_ID_LEN] = bytes.try_into().map_err(|_| {
        DictError::InvalidIdentifier(format!(
            "sequence identifier must be {} bytes, got {}",
            NAMESPACE_ID_LEN,
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(array))
}

impl DictionaryLayer for CounterLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_id(&self, term: &Term, _predicate: bool) -> Result<Resolved<Identifier>> {
        let iri = self.iri(term)?;
        let state = self.state.get()?;

        if let Some(id) = state.index.get(iri)? {
            return Ok(Resolved::first_level(id));
        }

        let mut next_id = self.next_id.lock();

        // Double-check (another thread might have created it)
        if let Some(id) = state.index.get(iri)? {
            return Ok(Resolved::first_level(id));
        }

        let id = *next_id;
        let bytes = id.to_be_bytes();

        // Persist the counter first so a crash never reissues a sequence number
        state.meta.put(NEXT_ID_KEY, &(id + 1).to_be_bytes())?;
        state.index.put_entry(iri, &bytes)?;
        *next_id = id + 1;
        self.ids_created.fetch_add(1, Ordering::Relaxed);
        debug!(layer = %self.name, id, "Assigned sequence number to {}", iri);

        Ok(Resolved::first_level(Identifier::from(&bytes[..])))
    }

    fn get_value(&self, id: &[u8], _predicate: bool) -> Result<Option<Resolved<Term>>> {
        if id.len() != NAMESPACE_ID_LEN {
            return Ok(None);
        }
        Ok(self
            .state
            .get()?
            .index
            .get_value(id)?
            .map(|iri| Resolved::first_level(Term::Iri(iri))))
    }

    fn remove_value(&self, term: &Term, _predicate: bool) -> Result<()> {
        let iri = self.iri(term)?;
        let state = self.state.get()?;
        let _guard = self.next_id.lock();
        state.index.remove(iri)?;
        Ok(())
    }

    fn is_resource(&self, id: &[u8]) -> bool {
        id.len() == NAMESPACE_ID_LEN
    }

    fn is_bnode(&self, _id: &[u8]) -> bool {
        false
    }

    fn is_literal(&self, _id: &[u8]) -> bool {
        false
    }

    fn initialise(&self, factory: &dyn StoreFactory) -> Result<()> {
        let index = BidirectionalIndex::open(factory, &self.name)?;
        let meta = factory.open(&format!("{}_meta", self.name))?;

        let next = match meta.get(NEXT_ID_KEY)? {
            Some(bytes) => decode_sequence(&bytes)?,
            None if index.is_empty()? => FIRST_ID,
            None => {
                let next = Self::recover_next_id(&index)?;
                warn!(layer = %self.name, next, "Sequence counter missing, recovered from index");
                meta.put(NEXT_ID_KEY, &next.to_be_bytes())?;
                next
            }
        };

        *self.next_id.lock() = next;
        info!(layer = %self.name, next, "Initialised counter dictionary");
        self.state.set(CounterState { index, meta });
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(state) = self.state.take() {
            state.index.flush()?;
            state.meta.flush()?;
            info!(layer = %self.name, "Closed counter dictionary");
        }
        Ok(())
    }

    fn collect_stats(&self, out: &mut Vec<LayerStats>) {
        out.push(
            LayerStats::new(&self.name)
                .with_counter("ids_created", self.ids_created.load(Ordering::Relaxed))
                .with_counter("next_id", *self.next_id.lock()),
        );
    }
}
