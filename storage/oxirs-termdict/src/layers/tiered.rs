//! Namespace / local-name split of IRIs
//!
//! An IRI is encoded as `[30][8B namespace id][local-name id]`, the two parts
//! coming from independent sub-dictionaries. Namespaces are shared by many
//! IRIs, so the fixed-width namespace id keeps identifiers of the same
//! vocabulary adjacent in key order. Blank nodes and literals bypass the split
//! and go to a dedicated sub-dictionary.

use super::{checked_name, close_all, DictionaryLayer, LayerStats, Resolved};
use crate::error::{DictError, Result};
use crate::identifier::{Identifier, NAMESPACE_ID_LEN, TIERED_MARKER};
use crate::store::StoreFactory;
use crate::term::Term;
use tracing::trace;

/// Dictionary splitting IRIs into namespace and local name
pub struct TieredSplitLayer {
    name: String,
    namespaces: Box<dyn DictionaryLayer>,
    local_names: Box<dyn DictionaryLayer>,
    values: Box<dyn DictionaryLayer>,
}

impl TieredSplitLayer {
    /// `namespaces` must issue 8-byte identifiers
    pub fn new(
        name: impl Into<String>,
        namespaces: Box<dyn DictionaryLayer>,
        local_names: Box<dyn DictionaryLayer>,
        values: Box<dyn DictionaryLayer>,
    ) -> Result<Self> {
        Ok(Self {
            name: checked_name(name)?,
            namespaces,
            local_names,
            values,
        })
    }

    fn is_tiered(id: &[u8]) -> bool {
        id.first() == Some(&TIERED_MARKER)
    }

    fn decode_part(&self, part: Option<Resolved<Term>>, what: &str) -> Result<Option<String>> {
        match part.map(Resolved::into_value) {
            Some(Term::Iri(s)) => Ok(Some(s)),
            Some(other) => Err(DictError::InvalidIdentifier(format!(
                "{what} dictionary of '{}' returned a non-IRI term {other}",
                self.name
            ))),
            None => Ok(None),
        }
    }
}

impl DictionaryLayer for TieredSplitLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_id(&self, term: &Term, predicate: bool) -> Result<Resolved<Identifier>> {
        let Some(iri) = term.as_iri() else {
            return self.values.get_id(term, predicate);
        };

        let (namespace, local_name) = Term::split_iri(iri);
        let ns = self.namespaces.get_id(&Term::iri(namespace), predicate)?;
        if ns.value.len() != NAMESPACE_ID_LEN {
            return Err(DictError::InvalidIdentifier(format!(
                "namespace dictionary '{}' issued a {}-byte identifier, expected {}",
                self.namespaces.name(),
                ns.value.len(),
                NAMESPACE_ID_LEN
            )));
        }
        let local = self.local_names.get_id(&Term::iri(local_name), predicate)?;
        trace!(layer = %self.name, namespace, local_name, "Split IRI");

        let mut bytes = Vec::with_capacity(1 + NAMESPACE_ID_LEN + local.value.len());
        bytes.push(TIERED_MARKER);
        bytes.extend_from_slice(&ns.value);
        bytes.extend_from_slice(&local.value);

        Ok(Resolved {
            value: Identifier::new(bytes),
            first_level: ns.first_level || local.first_level,
        })
    }

    fn get_value(&self, id: &[u8], predicate: bool) -> Result<Option<Resolved<Term>>> {
        if !Self::is_tiered(id) {
            return self.values.get_value(id, predicate);
        }
        if id.len() < 1 + NAMESPACE_ID_LEN {
            return Err(DictError::InvalidIdentifier(format!(
                "tiered identifier too short: {}",
                Identifier::from(id)
            )));
        }

        let (ns_id, local_id) = id[1..].split_at(NAMESPACE_ID_LEN);
        let ns = self.namespaces.get_value(ns_id, predicate)?;
        let local = self.local_names.get_value(local_id, predicate)?;
        let first_level = ns.as_ref().is_some_and(|r| r.first_level)
            || local.as_ref().is_some_and(|r| r.first_level);

        let namespace = self.decode_part(ns, "namespace")?;
        let local_name = self.decode_part(local, "local name")?;

        Ok(match (namespace, local_name) {
            (Some(namespace), Some(local_name)) => Some(Resolved {
                value: Term::Iri(namespace + &local_name),
                first_level,
            }),
            _ => None,
        })
    }

    fn remove_value(&self, term: &Term, predicate: bool) -> Result<()> {
        if term.is_iri() {
            // Namespaces and local names may be shared with other IRIs
            return Ok(());
        }
        self.values.remove_value(term, predicate)
    }

    fn is_resource(&self, id: &[u8]) -> bool {
        Self::is_tiered(id) || self.values.is_resource(id)
    }

    fn is_bnode(&self, id: &[u8]) -> bool {
        !Self::is_tiered(id) && self.values.is_bnode(id)
    }

    fn is_literal(&self, id: &[u8]) -> bool {
        !Self::is_tiered(id) && self.values.is_literal(id)
    }

    fn initialise(&self, factory: &dyn StoreFactory) -> Result<()> {
        self.namespaces.initialise(factory)?;
        self.local_names.initialise(factory)?;
        self.values.initialise(factory)
    }

    fn close(&self) -> Result<()> {
        close_all(&[&*self.namespaces, &*self.local_names, &*self.values])
    }

    fn collect_stats(&self, out: &mut Vec<LayerStats>) {
        self.namespaces.collect_stats(out);
        self.local_names.collect_stats(out);
        self.values.collect_stats(out);
    }
}
