//! Dictionary configuration and chain assembly

use crate::error::Result;
use crate::layers::{
    checked_name, CacheLayer, CacheStrategy, CounterLayer, DictionaryLayer, KnownVocabularyLayer,
    LongValueLayer, PersistentHashLayer, TieredSplitLayer, DEFAULT_KNOWN_NAMESPACES,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration of one cache layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Capacity of the identifier → term map
    pub id_capacity: usize,
    /// Capacity of the term → identifier map
    pub value_capacity: usize,
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            id_capacity: 10_000,
            value_capacity: 10_000,
        }
    }
}

/// Configuration for the term dictionary
///
/// The assembled chain, top to bottom:
///
/// 1. first-level cache (`first_level_cache`)
/// 2. known vocabulary fast path (`enable_known_vocabulary`)
/// 3. cumulative cache (`cumulative_cache`)
/// 4. namespace / local-name split (`enable_tiered`), whose namespaces get
///    sequential ids and whose local names and other values go through
/// 5. the long value layer over a persistent hash dictionary
///
/// # Examples
///
/// ```rust
/// use oxirs_termdict::{CacheConfig, DictionaryConfig, DictionaryLayer};
///
/// let config = DictionaryConfig {
///     name: "dataset".to_string(),
///     long_value_threshold: 256,
///     first_level_cache: CacheConfig::disabled(),
///     ..Default::default()
/// };
/// let chain = config.build().unwrap();
/// assert_eq!(chain.name(), "dataset_known_vocabulary");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Prefix of every layer and store name
    pub name: String,

    /// Canonical forms longer than this many characters are hashed instead of
    /// inlined. `0` hashes everything, a negative value selects the default.
    pub long_value_threshold: i64,

    /// Short-circuit IRIs of `known_namespaces`
    pub enable_known_vocabulary: bool,

    pub known_namespaces: Vec<String>,

    /// Split IRIs into namespace and local name
    pub enable_tiered: bool,

    /// Cache on top of the chain, keeping results of the layer below only
    pub first_level_cache: CacheConfig,

    /// Cache below the known vocabulary layer, keeping every result
    pub cumulative_cache: CacheConfig,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            name: "termdict".to_string(),
            long_value_threshold: 1000,
            enable_known_vocabulary: true,
            known_namespaces: DEFAULT_KNOWN_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
            enable_tiered: true,
            first_level_cache: CacheConfig::default(),
            cumulative_cache: CacheConfig::default(),
        }
    }
}

impl DictionaryConfig {
    /// Assemble the layer chain
    ///
    /// Fails with a construction error on an empty name or an enabled cache
    /// with zero capacity.
    pub fn build(&self) -> Result<Box<dyn DictionaryLayer>> {
        let name = &checked_name(self.name.as_str())?;

        let values = self.long_values(&format!("{name}_values"))?;
        let mut chain: Box<dyn DictionaryLayer> = if self.enable_tiered {
            Box::new(TieredSplitLayer::new(
                format!("{name}_tiered"),
                Box::new(CounterLayer::new(format!("{name}_namespaces"))?),
                self.long_values(&format!("{name}_local"))?,
                values,
            )?)
        } else {
            values
        };

        chain = wrap_cache(
            chain,
            &self.cumulative_cache,
            format!("{name}_cumulative_cache"),
            CacheStrategy::Cumulative,
        )?;

        if self.enable_known_vocabulary {
            chain = Box::new(KnownVocabularyLayer::new(
                format!("{name}_known_vocabulary"),
                self.known_namespaces.iter().cloned(),
                chain,
            )?);
        }

        chain = wrap_cache(
            chain,
            &self.first_level_cache,
            format!("{name}_first_level_cache"),
            CacheStrategy::FirstLevel,
        )?;

        info!(
            name = %self.name,
            threshold = self.long_value_threshold,
            known_vocabulary = self.enable_known_vocabulary,
            tiered = self.enable_tiered,
            first_level_cache = self.first_level_cache.enabled,
            cumulative_cache = self.cumulative_cache.enabled,
            "Assembled term dictionary chain"
        );
        Ok(chain)
    }

    fn long_values(&self, name: &str) -> Result<Box<dyn DictionaryLayer>> {
        Ok(Box::new(LongValueLayer::new(
            name,
            self.long_value_threshold,
            Box::new(PersistentHashLayer::new(format!("{name}_hashed"))?),
        )?))
    }
}

fn wrap_cache(
    chain: Box<dyn DictionaryLayer>,
    config: &CacheConfig,
    name: String,
    strategy: CacheStrategy,
) -> Result<Box<dyn DictionaryLayer>> {
    if !config.enabled {
        return Ok(chain);
    }
    Ok(Box::new(CacheLayer::new(
        name,
        strategy,
        config.id_capacity,
        config.value_capacity,
        chain,
    )?))
}
