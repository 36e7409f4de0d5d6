//! Inline encoding of short values, promotion of long ones
//!
//! Values whose canonical form is at most `threshold` characters long are
//! stored in the identifier itself: `[2][type][UTF-8 canonical form]`, no
//! hashing and no storage access. Longer values are handed to the inner
//! dictionary and its identifier is returned as `[1][inner id]`.

use super::{checked_name, DictionaryLayer, LayerStats, Resolved};
use crate::error::{DictError, Result};
use crate::identifier::{Identifier, THRESHOLD_EXCEEDED, THRESHOLD_NOT_EXCEEDED};
use crate::store::StoreFactory;
use crate::term::{Term, TermKind};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Default length threshold, in characters of the canonical form
pub const DEFAULT_LONG_VALUE_THRESHOLD: usize = 1000;

/// Dictionary keeping short values inline
pub struct LongValueLayer {
    name: String,
    /// Zero promotes every value
    threshold: usize,
    inner: Box<dyn DictionaryLayer>,
    inlined: AtomicU64,
    promoted: AtomicU64,
}

impl LongValueLayer {
    /// Create the layer; a negative `threshold` selects the default
    pub fn new(
        name: impl Into<String>,
        threshold: i64,
        inner: Box<dyn DictionaryLayer>,
    ) -> Result<Self> {
        let name = checked_name(name)?;
        let threshold = usize::try_from(threshold).unwrap_or(DEFAULT_LONG_VALUE_THRESHOLD);
        Ok(Self {
            name,
            threshold,
            inner,
            inlined: AtomicU64::new(0),
            promoted: AtomicU64::new(0),
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    fn exceeds_threshold(&self, canonical: &str) -> bool {
        // Byte length bounds the char count, so the count is only taken when needed
        self.threshold == 0
            || (canonical.len() > self.threshold && canonical.chars().count() > self.threshold)
    }

    fn inline_kind(id: &[u8]) -> Option<TermKind> {
        match id {
            [THRESHOLD_NOT_EXCEEDED, marker, ..] => TermKind::from_marker(*marker),
            _ => None,
        }
    }

    fn classify(&self, id: &[u8], kind: TermKind, inner: impl Fn(&[u8]) -> bool) -> bool {
        match id.first() {
            Some(&THRESHOLD_NOT_EXCEEDED) => Self::inline_kind(id) == Some(kind),
            Some(&THRESHOLD_EXCEEDED) => inner(&id[1..]),
            _ => false,
        }
    }
}

impl DictionaryLayer for LongValueLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_id(&self, term: &Term, predicate: bool) -> Result<Resolved<Identifier>> {
        term.validate()?;
        let canonical = term.canonical_form();

        if self.exceeds_threshold(&canonical) {
            let inner = self.inner.get_id(term, predicate)?;
            self.promoted.fetch_add(1, Ordering::Relaxed);
            debug!(
                layer = %self.name,
                chars = canonical.chars().count(),
                "Promoted long value to inner dictionary"
            );
            return Ok(inner.map(|id| Identifier::with_prefix(&[THRESHOLD_EXCEEDED], &id)));
        }

        self.inlined.fetch_add(1, Ordering::Relaxed);
        Ok(Resolved::first_level(Identifier::with_prefix(
            &[THRESHOLD_NOT_EXCEEDED, term.kind().marker()],
            canonical.as_bytes(),
        )))
    }

    fn get_value(&self, id: &[u8], predicate: bool) -> Result<Option<Resolved<Term>>> {
        match id.first() {
            Some(&THRESHOLD_NOT_EXCEEDED) => {
                if Self::inline_kind(id).is_none() {
                    return Err(DictError::InvalidIdentifier(format!(
                        "inline identifier without a valid type marker: {}",
                        Identifier::from(id)
                    )));
                }
                let canonical = std::str::from_utf8(&id[2..]).map_err(|e| {
                    DictError::InvalidIdentifier(format!("inline value is not UTF-8: {}", e))
                })?;
                Ok(Some(Resolved::first_level(Term::parse_canonical(canonical)?)))
            }
            Some(&THRESHOLD_EXCEEDED) => self.inner.get_value(&id[1..], predicate),
            _ => Err(DictError::InvalidIdentifier(format!(
                "unknown threshold flag in {}",
                Identifier::from(id)
            ))),
        }
    }

    fn remove_value(&self, term: &Term, predicate: bool) -> Result<()> {
        if self.exceeds_threshold(&term.canonical_form()) {
            self.inner.remove_value(term, predicate)?;
        }
        Ok(())
    }

    fn is_resource(&self, id: &[u8]) -> bool {
        self.classify(id, TermKind::Resource, |inner| self.inner.is_resource(inner))
    }

    fn is_bnode(&self, id: &[u8]) -> bool {
        self.classify(id, TermKind::BlankNode, |inner| self.inner.is_bnode(inner))
    }

    fn is_literal(&self, id: &[u8]) -> bool {
        self.classify(id, TermKind::Literal, |inner| self.inner.is_literal(inner))
    }

    fn initialise(&self, factory: &dyn StoreFactory) -> Result<()> {
        self.inner.initialise(factory)
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }

    fn collect_stats(&self, out: &mut Vec<LayerStats>) {
        out.push(
            LayerStats::new(&self.name)
                .with_counter("inlined", self.inlined.load(Ordering::Relaxed))
                .with_counter("promoted", self.promoted.load(Ordering::Relaxed)),
        );
        self.inner.collect_stats(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::testing::{CallCounts, CountingLayer};
    use crate::layers::PersistentHashLayer;
    use crate::store::MemoryStoreFactory;
    use std::sync::Arc;

    fn create_test_layer(threshold: i64) -> (LongValueLayer, Arc<CallCounts>) {
        let factory = MemoryStoreFactory::new();
        let hashed = PersistentHashLayer::new("long_values").unwrap();
        let (counting, counts) = CountingLayer::wrap(Box::new(hashed));
        let layer = LongValueLayer::new("values", threshold, Box::new(counting)).unwrap();
        layer.initialise(&factory).unwrap();
        (layer, counts)
    }

    #[test]
    fn test_short_literal_is_inlined() -> Result<()> {
        let (layer, counts) = create_test_layer(-1);
        assert_eq!(layer.threshold(), DEFAULT_LONG_VALUE_THRESHOLD);

        let term = Term::literal("a".repeat(500));
        let canonical = term.canonical_form();
        let id = layer.get_id(&term, false)?.value;

        assert_eq!(id.len(), canonical.len() + 2);
        assert_eq!(id[0], THRESHOLD_NOT_EXCEEDED);
        assert_eq!(id[1], TermKind::Literal.marker());
        assert_eq!(&id[2..], canonical.as_bytes());
        assert_eq!(counts.get_id(), 0);

        assert_eq!(layer.get_value(&id, false)?.map(Resolved::into_value), Some(term));
        assert_eq!(counts.get_value(), 0);

        Ok(())
    }

    #[test]
    fn test_threshold_boundary() -> Result<()> {
        let (layer, counts) = create_test_layer(12);

        // "0123456789" is 12 characters with its quotes
        let at_threshold = Term::literal("0123456789");
        let over_threshold = Term::literal("0123456789a");

        assert_eq!(layer.get_id(&at_threshold, false)?.value[0], THRESHOLD_NOT_EXCEEDED);
        assert_eq!(layer.get_id(&over_threshold, false)?.value[0], THRESHOLD_EXCEEDED);
        assert_eq!(counts.get_id(), 1);

        Ok(())
    }

    #[test]
    fn test_threshold_counts_characters() -> Result<()> {
        let (layer, _counts) = create_test_layer(5);

        // Three two-byte characters plus quotes: 5 characters, 8 bytes
        let term = Term::literal("äöü");
        let id = layer.get_id(&term, false)?.value;
        assert_eq!(id[0], THRESHOLD_NOT_EXCEEDED);
        assert_eq!(layer.get_value(&id, false)?.map(Resolved::into_value), Some(term));

        Ok(())
    }

    #[test]
    fn test_long_literal_is_promoted() -> Result<()> {
        let factory = MemoryStoreFactory::new();
        let layer = LongValueLayer::new(
            "values",
            -5,
            Box::new(PersistentHashLayer::new("long_values")?),
        )?;
        layer.initialise(&factory)?;

        let reference = PersistentHashLayer::new("long_values")?;
        reference.initialise(&factory)?;

        let term = Term::literal("x".repeat(DEFAULT_LONG_VALUE_THRESHOLD + 1));
        let id = layer.get_id(&term, false)?.value;

        assert_eq!(id[0], THRESHOLD_EXCEEDED);
        assert_eq!(&id[1..], reference.get_id(&term, false)?.value.as_bytes());
        assert!(layer.is_literal(&id));
        assert!(!layer.is_resource(&id));
        assert_eq!(layer.get_value(&id, false)?.map(Resolved::into_value), Some(term));

        Ok(())
    }

    #[test]
    fn test_zero_threshold_promotes_everything() -> Result<()> {
        let (layer, counts) = create_test_layer(0);

        let id = layer.get_id(&Term::blank_node("b"), false)?.value;
        assert_eq!(id[0], THRESHOLD_EXCEEDED);
        assert_eq!(counts.get_id(), 1);
        assert!(layer.is_bnode(&id));

        Ok(())
    }

    #[test]
    fn test_remove_only_forwards_promoted_values() -> Result<()> {
        let (layer, counts) = create_test_layer(10);

        layer.remove_value(&Term::literal("short"), false)?;
        assert_eq!(counts.remove_value(), 0);

        let long = Term::literal("a long literal value");
        let id = layer.get_id(&long, false)?.value;
        layer.remove_value(&long, false)?;
        assert_eq!(counts.remove_value(), 1);
        assert_eq!(layer.get_value(&id, false)?, None);

        Ok(())
    }

    #[test]
    fn test_classification_of_inline_ids() -> Result<()> {
        let (layer, _counts) = create_test_layer(-1);

        let iri = layer.get_id(&Term::iri("http://example.org/x"), false)?.value;
        let bnode = layer.get_id(&Term::blank_node("b0"), false)?.value;
        let literal = layer.get_id(&Term::lang_literal("hi", "en"), false)?.value;

        assert!(layer.is_resource(&iri) && !layer.is_literal(&iri) && !layer.is_bnode(&iri));
        assert!(layer.is_bnode(&bnode) && !layer.is_resource(&bnode));
        assert!(layer.is_literal(&literal) && !layer.is_bnode(&literal));
        assert!(!layer.is_literal(&[]) && !layer.is_resource(&[7, 1]));

        Ok(())
    }

    #[test]
    fn test_malformed_ids_are_rejected() {
        let (layer, _counts) = create_test_layer(-1);
        assert!(layer.get_value(&[9, 1, 2], false).is_err());
        assert!(layer.get_value(&[THRESHOLD_NOT_EXCEEDED, 9], false).is_err());
        assert!(layer.get_value(&[], false).is_err());
    }

    #[test]
    fn test_lossy_terms_are_rejected_before_storage() {
        let (layer, counts) = create_test_layer(0);

        let both = Term::Literal {
            value: "v".to_string(),
            language: Some("en".to_string()),
            datatype: Some("http://www.w3.org/2001/XMLSchema#string".to_string()),
        };
        for term in [both, Term::blank_node("")] {
            assert!(matches!(
                layer.get_id(&term, false),
                Err(DictError::UnsupportedTerm(_))
            ));
        }
        assert_eq!(counts.get_id(), 0);
    }
}
