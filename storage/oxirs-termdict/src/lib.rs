//! # OxiRS TermDict - Layered RDF Term Dictionary
//!
//! OxiRS TermDict maps RDF terms (IRIs, blank nodes, literals) to compact,
//! self-describing binary identifiers and back. Triple and quad indices store
//! these identifiers instead of full strings.
//!
//! ## Key Features
//!
//! - **Layered Encoding**: Caches, a known-vocabulary fast path, namespace
//!   splitting, inline short values and hashed long values, each a separate layer
//! - **Stable Identifiers**: Hashed identifiers are derived from the term itself
//!   and persisted, so the same term always maps to the same bytes
//! - **Byte-Level Classification**: IRI / blank node / literal is read from the
//!   identifier without touching storage
//! - **Composite Keys**: Length-framed concatenation of identifiers for
//!   multi-column index keys
//! - **Pluggable Storage**: Any ordered key-value map behind [`KvStore`], with
//!   in-memory and append-only file implementations included
//!
//! ## Quick Start
//!
//! ```rust
//! use oxirs_termdict::{DictionaryConfig, MemoryStoreFactory, Term, TermDictionary};
//!
//! # fn example() -> oxirs_termdict::Result<()> {
//! let dictionary = TermDictionary::from_config(&DictionaryConfig::default())?;
//! dictionary.initialise(&MemoryStoreFactory::new())?;
//!
//! let alice = Term::iri("http://example.org/alice");
//! let name = Term::iri("http://xmlns.com/foaf/0.1/name");
//! let value = Term::literal("Alice");
//!
//! let ids = dictionary.as_identifiers(&alice, &name, &value)?;
//! assert!(dictionary.is_resource(&ids[0]));
//! assert!(dictionary.is_literal(&ids[2]));
//!
//! let triple = dictionary.as_triple(&ids)?;
//! assert_eq!(triple.object, value);
//!
//! dictionary.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture Overview
//!
//! ### Layers
//! - **[`layers::CacheLayer`]**: Bounded LRU caches in both directions
//! - **[`layers::KnownVocabularyLayer`]**: 19-byte identifiers for RDF, RDFS,
//!   OWL, XSD and friends
//! - **[`layers::TieredSplitLayer`]**: `[namespace id][local-name id]` for IRIs
//! - **[`layers::LongValueLayer`]**: Inline short values, hash long ones
//! - **[`layers::PersistentHashLayer`]**: xxh3-128 identifiers with collision probing
//! - **[`layers::CounterLayer`]**: Sequential 8-byte identifiers for namespaces
//!
//! ### Storage
//! - **[`index`]**: Bidirectional value ↔ identifier mapping
//! - **[`store`]**: Key-value store abstraction and implementations
//!
//! ## Configuration
//!
//! The usual chain is assembled from a [`DictionaryConfig`]:
//!
//! ```rust
//! use oxirs_termdict::{CacheConfig, DictionaryConfig};
//!
//! let config = DictionaryConfig {
//!     name: "dataset".to_string(),
//!     long_value_threshold: 512,
//!     cumulative_cache: CacheConfig {
//!         enabled: true,
//!         id_capacity: 100_000,
//!         value_capacity: 100_000,
//!     },
//!     ..Default::default()
//! };
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] with a [`DictError`]. Backing store
//! failures are propagated unchanged; nothing is retried.

pub mod config;
pub mod error;
pub mod identifier;
pub mod index;
pub mod layers;
pub mod store;
pub mod term;

// Re-export main types for convenience
pub use config::{CacheConfig, DictionaryConfig};
pub use error::{DictError, Result};
pub use identifier::Identifier;
pub use index::BidirectionalIndex;
pub use layers::{DictionaryLayer, LayerStats, Resolved};
pub use store::{FileStoreFactory, KvStore, MemoryStoreFactory, StoreFactory};
pub use term::{Quad, Term, TermKind, Triple};

use tracing::info;

/// Front door of a term dictionary chain
///
/// Turns terms, triples and quads into identifiers and back, and builds the
/// composite keys used by triple indices. Identifier classification only looks
/// at the bytes.
///
/// The dictionary is `Send + Sync`; share it between threads behind an `Arc`.
///
/// # Examples
///
/// ```rust
/// use oxirs_termdict::{MemoryStoreFactory, Term, TermDictionary};
/// use oxirs_termdict::layers::{LongValueLayer, PersistentHashLayer};
///
/// # fn example() -> oxirs_termdict::Result<()> {
/// let chain = LongValueLayer::new(
///     "values",
///     64,
///     Box::new(PersistentHashLayer::new("values_hashed")?),
/// )?;
/// let dictionary = TermDictionary::new(Box::new(chain));
/// dictionary.initialise(&MemoryStoreFactory::new())?;
///
/// let id = dictionary.get_id(&Term::blank_node("b0"), false)?;
/// assert!(dictionary.is_bnode(&id));
/// # Ok(())
/// # }
/// ```
pub struct TermDictionary {
    chain: Box<dyn DictionaryLayer>,
}

impl TermDictionary {
    /// Wrap an assembled layer chain
    pub fn new(chain: Box<dyn DictionaryLayer>) -> Self {
        Self { chain }
    }

    /// Assemble the chain described by `config`
    pub fn from_config(config: &DictionaryConfig) -> Result<Self> {
        Ok(Self::new(config.build()?))
    }

    /// Name of the top layer
    pub fn name(&self) -> &str {
        self.chain.name()
    }

    /// The top layer of the chain
    pub fn chain(&self) -> &dyn DictionaryLayer {
        &*self.chain
    }

    /// Open the storage of every layer
    pub fn initialise(&self, factory: &dyn StoreFactory) -> Result<()> {
        self.chain.initialise(factory)?;
        info!(dictionary = %self.name(), "Initialised term dictionary");
        Ok(())
    }

    /// Flush and release the storage of every layer
    pub fn close(&self) -> Result<()> {
        self.chain.close()?;
        info!(dictionary = %self.name(), "Closed term dictionary");
        Ok(())
    }

    /// Identifier of `term`, created on first use
    ///
    /// `predicate` tells whether the term is used in predicate position.
    /// Terms that [`Term::validate`] rejects fail with
    /// [`DictError::UnsupportedTerm`].
    pub fn get_id(&self, term: &Term, predicate: bool) -> Result<Identifier> {
        term.validate()?;
        Ok(self.chain.get_id(term, predicate)?.into_value())
    }

    /// Term behind `id`, `None` when no layer knows it
    pub fn get_value(&self, id: &[u8], predicate: bool) -> Result<Option<Term>> {
        Ok(self.chain.get_value(id, predicate)?.map(Resolved::into_value))
    }

    /// Forget `term`
    ///
    /// Parts shared with other terms, such as namespaces, are kept.
    pub fn remove_value(&self, term: &Term, predicate: bool) -> Result<()> {
        self.chain.remove_value(term, predicate)
    }

    /// Identifiers of a triple, in subject, predicate, object order
    pub fn as_identifiers(
        &self,
        subject: &Term,
        predicate: &Term,
        object: &Term,
    ) -> Result<[Identifier; 3]> {
        Ok([
            self.get_id(subject, false)?,
            self.get_id(predicate, true)?,
            self.get_id(object, false)?,
        ])
    }

    /// Identifiers of a quad, in subject, predicate, object, context order
    pub fn as_quad_identifiers(
        &self,
        subject: &Term,
        predicate: &Term,
        object: &Term,
        context: &Term,
    ) -> Result<[Identifier; 4]> {
        let [s, p, o] = self.as_identifiers(subject, predicate, object)?;
        Ok([s, p, o, self.get_id(context, false)?])
    }

    /// Identifiers of `triple`
    pub fn triple_identifiers(&self, triple: &Triple) -> Result<[Identifier; 3]> {
        self.as_identifiers(&triple.subject, &triple.predicate, &triple.object)
    }

    /// Triple behind three identifiers
    ///
    /// Fails with [`DictError::UnknownIdentifier`] if any identifier does not
    /// resolve.
    pub fn as_triple(&self, ids: &[Identifier; 3]) -> Result<Triple> {
        Ok(Triple::new(
            self.resolve(&ids[0], false)?,
            self.resolve(&ids[1], true)?,
            self.resolve(&ids[2], false)?,
        ))
    }

    /// Quad behind four identifiers
    pub fn as_quad(&self, ids: &[Identifier; 4]) -> Result<Quad> {
        Ok(Quad::new(
            self.resolve(&ids[0], false)?,
            self.resolve(&ids[1], true)?,
            self.resolve(&ids[2], false)?,
            self.resolve(&ids[3], false)?,
        ))
    }

    fn resolve(&self, id: &[u8], predicate: bool) -> Result<Term> {
        self.get_value(id, predicate)?.ok_or_else(|| {
            DictError::UnknownIdentifier(format!(
                "{} is unknown to dictionary '{}'",
                Identifier::from(id),
                self.name()
            ))
        })
    }

    /// Length-framed composite key, see [`identifier::compose`]
    pub fn compose(&self, parts: &[&[u8]]) -> Result<Identifier> {
        identifier::compose(parts)
    }

    pub fn compose2(&self, first: &[u8], second: &[u8]) -> Result<Identifier> {
        identifier::compose(&[first, second])
    }

    pub fn compose3(&self, first: &[u8], second: &[u8], third: &[u8]) -> Result<Identifier> {
        identifier::compose(&[first, second, third])
    }

    /// Components of a composite key
    pub fn decompose(&self, composite: &[u8]) -> Result<Vec<Identifier>> {
        identifier::decompose(composite)
    }

    pub fn is_resource(&self, id: &[u8]) -> bool {
        self.chain.is_resource(id)
    }

    pub fn is_bnode(&self, id: &[u8]) -> bool {
        self.chain.is_bnode(id)
    }

    pub fn is_literal(&self, id: &[u8]) -> bool {
        self.chain.is_literal(id)
    }

    /// Counters of every layer, top to bottom
    pub fn stats(&self) -> Vec<LayerStats> {
        let mut stats = Vec::new();
        self.chain.collect_stats(&mut stats);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_dictionary() -> TermDictionary {
        let dictionary = TermDictionary::from_config(&DictionaryConfig::default()).unwrap();
        dictionary.initialise(&MemoryStoreFactory::new()).unwrap();
        dictionary
    }

    #[test]
    fn test_triple_round_trip() -> Result<()> {
        let dictionary = create_test_dictionary();

        let triple = Triple::new(
            Term::iri("http://example.org/alice"),
            Term::iri("http://xmlns.com/foaf/0.1/knows"),
            Term::blank_node("bob"),
        );
        let ids = dictionary.triple_identifiers(&triple)?;
        assert_eq!(dictionary.as_triple(&ids)?, triple);

        Ok(())
    }

    #[test]
    fn test_quad_round_trip() -> Result<()> {
        let dictionary = create_test_dictionary();

        let quad = Quad::new(
            Term::iri("http://example.org/s"),
            Term::iri("http://example.org/p"),
            Term::lang_literal("bonjour", "fr"),
            Term::iri("http://example.org/graph"),
        );
        let ids = dictionary.as_quad_identifiers(
            &quad.subject,
            &quad.predicate,
            &quad.object,
            &quad.context,
        )?;
        assert_eq!(dictionary.as_quad(&ids)?, quad);
        assert_eq!(dictionary.as_quad(&ids)?.to_triple(), quad.to_triple());

        Ok(())
    }

    #[test]
    fn test_unknown_identifier_in_triple() -> Result<()> {
        let dictionary = create_test_dictionary();

        let known = dictionary.get_id(&Term::iri("http://example.org/a"), false)?;
        // Promoted literal id pointing at a hash that was never stored
        let unknown = Identifier::with_prefix(&[1, 3], &[0xAB; 16]);

        let result = dictionary.as_triple(&[known.clone(), known, unknown]);
        assert!(matches!(result, Err(DictError::UnknownIdentifier(_))));

        Ok(())
    }

    #[test]
    fn test_composite_helpers() -> Result<()> {
        let dictionary = create_test_dictionary();

        let s = dictionary.get_id(&Term::iri("http://example.org/s"), false)?;
        let p = dictionary.get_id(&Term::iri("http://example.org/p"), true)?;
        let o = dictionary.get_id(&Term::literal("o"), false)?;

        let key = dictionary.compose3(&s, &p, &o)?;
        assert_eq!(dictionary.decompose(&key)?, vec![s.clone(), p.clone(), o]);
        assert_eq!(dictionary.compose2(&s, &p)?, dictionary.compose(&[s.as_bytes(), p.as_bytes()])?);
        assert!(dictionary.compose2(&s, &[]).is_err());

        Ok(())
    }

    #[test]
    fn test_stats_cover_every_layer() {
        let dictionary = create_test_dictionary();
        let stats = dictionary.stats();
        assert_eq!(stats[0].layer, dictionary.name());
        assert!(stats.iter().any(|s| s.layer == "termdict_values_hashed"));
    }
}
