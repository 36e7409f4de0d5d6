//! Error types for the OxiRS term dictionary

use thiserror::Error;

/// Term dictionary error type
#[derive(Error, Debug)]
pub enum DictError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing store unreachable, misconfigured, or layer used before `initialise`
    #[error("Initialisation failure: {0}")]
    Initialisation(String),

    /// Per-operation backing store failure
    #[error("Storage access failure: {0}")]
    StorageAccess(String),

    /// Invalid arguments detected while building a layer or a composite key
    #[error("Construction error: {0}")]
    Construction(String),

    /// Identifier bytes that no layer of the chain can interpret
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Identifier that is well-formed but unknown to the dictionary
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// Term kind a layer cannot encode
    #[error("Unsupported term: {0}")]
    UnsupportedTerm(String),

    /// Canonical term form or store record could not be decoded
    #[error("Codec error: {0}")]
    Codec(String),
}

impl DictError {
    pub(crate) fn construction(msg: impl Into<String>) -> Self {
        DictError::Construction(msg.into())
    }

    pub(crate) fn not_initialised(layer: &str) -> Self {
        DictError::Initialisation(format!("layer '{layer}' used before initialise"))
    }
}

/// Result type for term dictionary operations
pub type Result<T> = std::result::Result<T, DictError>;
