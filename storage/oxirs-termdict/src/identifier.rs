//! Binary identifiers and their scheme markers
//!
//! Layouts (integers big-endian):
//!
//! | scheme            | layout                                   |
//! |-------------------|------------------------------------------|
//! | hashed            | `[type][16B hash]`                       |
//! | known vocabulary  | `[31][type][17B hashed id]`              |
//! | tiered IRI        | `[30][8B namespace id][local-name id]`   |
//! | inline value      | `[2][type][UTF-8 canonical form]`        |
//! | promoted value    | `[1][inner id]`                          |
//! | counter           | `[8B sequence]`                          |
//! | composite         | `[2B count]{[2B length][payload]}*`      |

use crate::error::{DictError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Length of a hashed identifier: type marker plus 128-bit hash
pub const HASHED_ID_LEN: usize = 17;

/// Marker of identifiers issued by the known vocabulary layer
pub const KNOWN_VOCABULARY_MARKER: u8 = 31;

/// Length of a known vocabulary identifier
pub const KNOWN_VOCABULARY_ID_LEN: usize = 2 + HASHED_ID_LEN;

/// Marker of IRI identifiers issued by the tiered split layer
pub const TIERED_MARKER: u8 = 30;

/// Length of the namespace part of a tiered identifier
pub const NAMESPACE_ID_LEN: usize = 8;

/// Flag of a value promoted to the inner dictionary
pub const THRESHOLD_EXCEEDED: u8 = 1;

/// Flag of a value encoded inline
pub const THRESHOLD_NOT_EXCEEDED: u8 = 2;

/// Opaque binary identifier standing in for a term
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(Vec<u8>);

impl Identifier {
    pub fn new(bytes: Vec<u8>) -> Self {
        Identifier(bytes)
    }

    /// Build an identifier from a marker byte followed by `payload`
    pub fn with_prefix(prefix: &[u8], payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(prefix.len() + payload.len());
        bytes.extend_from_slice(prefix);
        bytes.extend_from_slice(payload);
        Identifier(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Identifier {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Identifier {
    fn from(bytes: Vec<u8>) -> Self {
        Identifier(bytes)
    }
}

impl From<&[u8]> for Identifier {
    fn from(bytes: &[u8]) -> Self {
        Identifier(bytes.to_vec())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Concatenate identifiers into a length-framed composite key
///
/// Every component must be non-empty and at most `u16::MAX` bytes long.
pub fn compose(parts: &[&[u8]]) -> Result<Identifier> {
    if parts.is_empty() {
        return Err(DictError::construction("composite needs at least one component"));
    }
    let count = u16::try_from(parts.len()).map_err(|_| {
        DictError::construction(format!("too many composite components: {}", parts.len()))
    })?;

    let total: usize = parts.iter().map(|p| 2 + p.len()).sum();
    let mut bytes = Vec::with_capacity(2 + total);
    bytes.extend_from_slice(&count.to_be_bytes());

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return Err(DictError::construction(format!(
                "composite component {i} is missing"
            )));
        }
        let len = u16::try_from(part.len()).map_err(|_| {
            DictError::construction(format!(
                "composite component {i} too long: {} bytes",
                part.len()
            ))
        })?;
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(part);
    }

    Ok(Identifier(bytes))
}

/// Split a composite key built by [`compose`] back into its components
pub fn decompose(composite: &[u8]) -> Result<Vec<Identifier>> {
    let mut cursor = composite;
    let count = take_u16(&mut cursor)?;
    if count == 0 {
        return Err(DictError::InvalidIdentifier(
            "composite without components".to_string(),
        ));
    }
    let mut parts = Vec::with_capacity(count as usize);

    for i in 0..count {
        let len = take_u16(&mut cursor)? as usize;
        if len == 0 {
            return Err(DictError::InvalidIdentifier(format!(
                "composite component {i} is empty"
            )));
        }
        if cursor.len() < len {
            return Err(DictError::InvalidIdentifier(format!(
                "composite component truncated: need {len} bytes, have {}",
                cursor.len()
            )));
        }
        let (part, rest) = cursor.split_at(len);
        parts.push(Identifier::from(part));
        cursor = rest;
    }

    if !cursor.is_empty() {
        return Err(DictError::InvalidIdentifier(format!(
            "{} trailing bytes after composite",
            cursor.len()
        )));
    }

    Ok(parts)
}

fn take_u16(cursor: &mut &[u8]) -> Result<u16> {
    if cursor.len() < 2 {
        return Err(DictError::InvalidIdentifier(
            "composite length prefix truncated".to_string(),
        ));
    }
    let value = u16::from_be_bytes([cursor[0], cursor[1]]);
    *cursor = &cursor[2..];
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_decompose() -> Result<()> {
        let composite = compose(&[&[1, 2, 3], &[4, 5]])?;
        assert_eq!(composite.as_bytes(), &[0, 2, 0, 3, 1, 2, 3, 0, 2, 4, 5]);

        let parts = decompose(&composite)?;
        assert_eq!(
            parts,
            vec![Identifier::new(vec![1, 2, 3]), Identifier::new(vec![4, 5])]
        );
        Ok(())
    }

    #[test]
    fn test_compose_rejects_missing_component() {
        assert!(matches!(
            compose(&[&[1, 2], &[]]),
            Err(DictError::Construction(_))
        ));
        assert!(matches!(compose(&[]), Err(DictError::Construction(_))));

        let oversized = vec![0u8; u16::MAX as usize + 1];
        assert!(matches!(
            compose(&[&oversized]),
            Err(DictError::Construction(_))
        ));
    }

    #[test]
    fn test_decompose_rejects_bad_framing() {
        assert!(decompose(&[0]).is_err());
        assert!(decompose(&[0, 1, 0, 5, 1, 2]).is_err());
        assert!(decompose(&[0, 1, 0, 1, 9, 9]).is_err());
        assert!(matches!(
            decompose(&[0, 0]),
            Err(DictError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            decompose(&[0, 1, 0, 0]),
            Err(DictError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_identifier_display() {
        let id = Identifier::with_prefix(&[TIERED_MARKER], &[0xab, 0x01]);
        assert_eq!(id.to_string(), "1eab01");
        assert_eq!(id.len(), 3);
    }
}
