//! Fast path for IRIs of well-known vocabularies
//!
//! IRIs whose namespace belongs to a fixed set are encoded from a small
//! dedicated hashed dictionary as `[31][type][17B hashed id]` and never reach
//! the layers below. Everything else is passed down unchanged.

use super::{checked_name, close_all, DictionaryLayer, LayerStats, PersistentHashLayer, Resolved};
use crate::error::Result;
use crate::identifier::{Identifier, KNOWN_VOCABULARY_ID_LEN, KNOWN_VOCABULARY_MARKER};
use crate::store::StoreFactory;
use crate::term::{Term, TermKind};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Namespaces recognised when none are configured
pub const DEFAULT_KNOWN_NAMESPACES: &[&str] = &[
    "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
    "http://www.w3.org/2000/01/rdf-schema#",
    "http://www.w3.org/2002/07/owl#",
    "http://www.w3.org/2001/XMLSchema#",
    "http://xmlns.com/foaf/0.1/",
    "http://purl.org/dc/elements/1.1/",
    "http://purl.org/dc/terms/",
    "http://www.w3.org/2004/02/skos/core#",
];

/// Dictionary layer short-circuiting well-known namespaces
pub struct KnownVocabularyLayer {
    name: String,
    namespaces: HashSet<String>,
    known: PersistentHashLayer,
    next: Box<dyn DictionaryLayer>,
    known_hits: AtomicU64,
    delegated: AtomicU64,
}

impl KnownVocabularyLayer {
    /// Layer recognising [`DEFAULT_KNOWN_NAMESPACES`]
    pub fn with_default_namespaces(
        name: impl Into<String>,
        next: Box<dyn DictionaryLayer>,
    ) -> Result<Self> {
        Self::new(name, DEFAULT_KNOWN_NAMESPACES.iter().copied(), next)
    }

    pub fn new<I, S>(
        name: impl Into<String>,
        namespaces: I,
        next: Box<dyn DictionaryLayer>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = checked_name(name)?;
        let known = PersistentHashLayer::new(format!("{name}_known"))?;
        Ok(Self {
            name,
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            known,
            next,
            known_hits: AtomicU64::new(0),
            delegated: AtomicU64::new(0),
        })
    }

    /// Whether `term` is an IRI of a known namespace
    pub fn is_known(&self, term: &Term) -> bool {
        term.namespace().is_some_and(|ns| self.namespaces.contains(ns))
    }

    fn is_marked(id: &[u8]) -> bool {
        id.first() == Some(&KNOWN_VOCABULARY_MARKER)
    }

    fn marked_kind(id: &[u8]) -> Option<TermKind> {
        if id.len() != KNOWN_VOCABULARY_ID_LEN {
            return None;
        }
        TermKind::from_marker(id[1])
    }
}

impl DictionaryLayer for KnownVocabularyLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_id(&self, term: &Term, predicate: bool) -> Result<Resolved<Identifier>> {
        if !self.is_known(term) {
            self.delegated.fetch_add(1, Ordering::Relaxed);
            let resolved = self.next.get_id(term, predicate)?;
            return Ok(Resolved::deeper(resolved.value));
        }

        self.known_hits.fetch_add(1, Ordering::Relaxed);
        let hashed = self.known.get_id(term, predicate)?.value;
        Ok(Resolved::first_level(Identifier::with_prefix(
            &[KNOWN_VOCABULARY_MARKER, term.kind().marker()],
            &hashed,
        )))
    }

    fn get_value(&self, id: &[u8], predicate: bool) -> Result<Option<Resolved<Term>>> {
        if !Self::is_marked(id) {
            let resolved = self.next.get_value(id, predicate)?;
            return Ok(resolved.map(|r| Resolved::deeper(r.value)));
        }
        if Self::marked_kind(id).is_none() {
            return Ok(None);
        }
        Ok(self
            .known
            .get_value(&id[2..], predicate)?
            .map(|r| Resolved::first_level(r.value)))
    }

    fn remove_value(&self, term: &Term, predicate: bool) -> Result<()> {
        if self.is_known(term) {
            self.known.remove_value(term, predicate)
        } else {
            self.next.remove_value(term, predicate)
        }
    }

    fn is_resource(&self, id: &[u8]) -> bool {
        if Self::is_marked(id) {
            return Self::marked_kind(id) == Some(TermKind::Resource);
        }
        self.next.is_resource(id)
    }

    fn is_bnode(&self, id: &[u8]) -> bool {
        if Self::is_marked(id) {
            return Self::marked_kind(id) == Some(TermKind::BlankNode);
        }
        self.next.is_bnode(id)
    }

    fn is_literal(&self, id: &[u8]) -> bool {
        if Self::is_marked(id) {
            return Self::marked_kind(id) == Some(TermKind::Literal);
        }
        self.next.is_literal(id)
    }

    fn initialise(&self, factory: &dyn StoreFactory) -> Result<()> {
        self.known.initialise(factory)?;
        self.next.initialise(factory)
    }

    fn close(&self) -> Result<()> {
        close_all(&[&self.known as &dyn DictionaryLayer, &*self.next])
    }

    fn collect_stats(&self, out: &mut Vec<LayerStats>) {
        let hits = self.known_hits.load(Ordering::Relaxed);
        let delegated = self.delegated.load(Ordering::Relaxed);
        let total = hits + delegated;
        out.push(
            LayerStats::new(&self.name)
                .with_counter("known_hits", hits)
                .with_counter("delegated", delegated)
                .with_ratio(
                    "known_ratio",
                    if total == 0 {
                        0.0
                    } else {
                        hits as f64 / total as f64
                    },
                ),
        );
        self.known.collect_stats(out);
        self.next.collect_stats(out);
    }
}
