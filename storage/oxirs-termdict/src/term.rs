//! RDF terms and their canonical string form
//!
//! The canonical form of a term is its N-Triples serialization. It is the
//! string that gets hashed, stored in the bidirectional indices, and measured
//! against the long-value threshold.

use crate::error::{DictError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Write as _};

/// RDF term representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// IRI/URI reference
    Iri(String),
    /// Blank node with its label (without the `_:` prefix)
    BlankNode(String),
    /// Literal value with optional language tag or datatype IRI
    Literal {
        value: String,
        language: Option<String>,
        datatype: Option<String>,
    },
}

/// Kind of a term, also the one-byte type marker used inside identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TermKind {
    Resource = 1,
    BlankNode = 2,
    Literal = 3,
}

impl TermKind {
    /// Marker byte written into identifiers
    pub fn marker(self) -> u8 {
        self as u8
    }

    /// Decode a marker byte
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            1 => Some(TermKind::Resource),
            2 => Some(TermKind::BlankNode),
            3 => Some(TermKind::Literal),
            _ => None,
        }
    }
}

impl Term {
    /// Create a new IRI term
    pub fn iri<S: Into<String>>(iri: S) -> Self {
        Term::Iri(iri.into())
    }

    /// Create a new blank node
    pub fn blank_node<S: Into<String>>(id: S) -> Self {
        Term::BlankNode(id.into())
    }

    /// Create a new plain literal
    pub fn literal<S: Into<String>>(value: S) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    /// Create a new typed literal
    pub fn typed_literal<S: Into<String>, T: Into<String>>(value: S, datatype: T) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
            datatype: Some(datatype.into()),
        }
    }

    /// Create a new language-tagged literal
    pub fn lang_literal<S: Into<String>, L: Into<String>>(value: S, language: L) -> Self {
        Term::Literal {
            value: value.into(),
            language: Some(language.into()),
            datatype: None,
        }
    }

    pub fn kind(&self) -> TermKind {
        match self {
            Term::Iri(_) => TermKind::Resource,
            Term::BlankNode(_) => TermKind::BlankNode,
            Term::Literal { .. } => TermKind::Literal,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// The IRI string, if this term is an IRI
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// N-Triples form of the term
    ///
    /// Only terms accepted by [`Term::validate`] parse back to themselves.
    pub fn canonical_form(&self) -> String {
        self.to_string()
    }

    /// Check that the term survives a trip through its canonical form
    ///
    /// Rejects empty blank node labels, empty language tags, and literals
    /// carrying both a language tag and a datatype.
    pub fn validate(&self) -> Result<()> {
        match self {
            Term::BlankNode(label) if label.is_empty() => Err(DictError::UnsupportedTerm(
                "blank node with an empty label".to_string(),
            )),
            Term::Literal {
                language: Some(_),
                datatype: Some(_),
                ..
            } => Err(DictError::UnsupportedTerm(format!(
                "literal with both a language tag and a datatype: {self}"
            ))),
            Term::Literal {
                language: Some(lang),
                ..
            } if lang.is_empty() => Err(DictError::UnsupportedTerm(format!(
                "literal with an empty language tag: {self}"
            ))),
            _ => Ok(()),
        }
    }

    /// Parse the N-Triples form produced by [`Term::canonical_form`]
    pub fn parse_canonical(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix('<') {
            let inner = rest
                .strip_suffix('>')
                .ok_or_else(|| DictError::Codec(format!("unterminated IRI: {s}")))?;
            return Ok(Term::Iri(unescape(inner)?));
        }

        if let Some(label) = s.strip_prefix("_:") {
            if label.is_empty() {
                return Err(DictError::Codec("empty blank node label".to_string()));
            }
            return Ok(Term::BlankNode(label.to_string()));
        }

        if let Some(rest) = s.strip_prefix('"') {
            let close = closing_quote(rest)
                .ok_or_else(|| DictError::Codec(format!("unterminated literal: {s}")))?;
            let value = unescape(&rest[..close])?;
            let suffix = &rest[close + 1..];

            if suffix.is_empty() {
                return Ok(Term::literal(value));
            }
            if let Some(lang) = suffix.strip_prefix('@') {
                if lang.is_empty() {
                    return Err(DictError::Codec(format!("empty language tag: {s}")));
                }
                return Ok(Term::lang_literal(value, lang));
            }
            if let Some(dt) = suffix.strip_prefix("^^<").and_then(|d| d.strip_suffix('>')) {
                return Ok(Term::typed_literal(value, unescape(dt)?));
            }
            return Err(DictError::Codec(format!("invalid literal suffix: {s}")));
        }

        Err(DictError::Codec(format!("not a canonical term: {s}")))
    }

    /// Split an IRI into namespace and local name
    ///
    /// The namespace ends after the last `#`, else the last `/`, else the last
    /// `:`. Without any of them the namespace is empty.
    pub fn split_iri(iri: &str) -> (&str, &str) {
        let at = iri
            .rfind('#')
            .or_else(|| iri.rfind('/'))
            .or_else(|| iri.rfind(':'))
            .map_or(0, |i| i + 1);
        iri.split_at(at)
    }

    /// Namespace of this term if it is an IRI
    pub fn namespace(&self) -> Option<&str> {
        self.as_iri().map(|iri| Self::split_iri(iri).0)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => {
                f.write_char('<')?;
                escape_iri(iri, f)?;
                f.write_char('>')
            }
            Term::BlankNode(id) => write!(f, "_:{}", id),
            Term::Literal {
                value,
                language,
                datatype,
            } => {
                f.write_char('"')?;
                escape_literal(value, f)?;
                f.write_char('"')?;
                if let Some(lang) = language {
                    write!(f, "@{}", lang)?;
                } else if let Some(dt) = datatype {
                    f.write_str("^^<")?;
                    escape_iri(dt, f)?;
                    f.write_char('>')?;
                }
                Ok(())
            }
        }
    }
}

/// A triple of terms
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// A triple with its context (named graph)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub context: Term,
}

impl Quad {
    pub fn new(subject: Term, predicate: Term, object: Term, context: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            context,
        }
    }

    /// Drop the context
    pub fn to_triple(&self) -> Triple {
        Triple::new(
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
        )
    }
}

fn escape_literal(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04X}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

fn escape_iri(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | ' ' => {
                write!(f, "\\u{:04X}", ch as u32)?
            }
            c if c.is_control() => write!(f, "\\u{:04X}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Byte offset of the first unescaped `"` in `s`
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

fn unescape(s: &str) -> Result<String> {
    if !s.contains('\\') {
        return Ok(s.to_string());
    }

    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => result.push('\t'),
            Some('b') => result.push('\u{8}'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('f') => result.push('\u{c}'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('\\') => result.push('\\'),
            Some('u') => result.push(unescape_code_point(&mut chars, 4)?),
            Some('U') => result.push(unescape_code_point(&mut chars, 8)?),
            Some(other) => {
                return Err(DictError::Codec(format!("invalid escape sequence: \\{other}")))
            }
            None => return Err(DictError::Codec("dangling escape".to_string())),
        }
    }

    Ok(result)
}

fn unescape_code_point(chars: &mut std::str::Chars<'_>, digits: usize) -> Result<char> {
    let code: String = chars.by_ref().take(digits).collect();
    if code.len() != digits {
        return Err(DictError::Codec(format!("truncated unicode escape: {code}")));
    }
    let code_point = u32::from_str_radix(&code, 16)
        .map_err(|_| DictError::Codec(format!("invalid unicode escape: {code}")))?;
    char::from_u32(code_point)
        .ok_or_else(|| DictError::Codec(format!("invalid code point: {code_point:#x}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_forms() {
        assert_eq!(
            Term::iri("http://example.org/a").canonical_form(),
            "<http://example.org/a>"
        );
        assert_eq!(Term::blank_node("b0").canonical_form(), "_:b0");
        assert_eq!(Term::literal("hi").canonical_form(), "\"hi\"");
        assert_eq!(
            Term::lang_literal("bonjour", "fr").canonical_form(),
            "\"bonjour\"@fr"
        );
        assert_eq!(
            Term::typed_literal("42", "http://www.w3.org/2001/XMLSchema#integer")
                .canonical_form(),
            "\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn test_parse_canonical_roundtrip() -> Result<()> {
        let terms = vec![
            Term::iri("http://example.org/resource"),
            Term::iri("urn:weird<iri>with spaces"),
            Term::blank_node("node42"),
            Term::literal("line one\nline \"two\"\t\\ end"),
            Term::lang_literal("Grüße", "de"),
            Term::typed_literal("3.14", "http://www.w3.org/2001/XMLSchema#decimal"),
            Term::literal(""),
            Term::literal("bell\u{7}"),
        ];

        for term in terms {
            let parsed = Term::parse_canonical(&term.canonical_form())?;
            assert_eq!(parsed, term);
        }

        Ok(())
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Term::parse_canonical("<http://unterminated").is_err());
        assert!(Term::parse_canonical("_:").is_err());
        assert!(Term::parse_canonical("\"open").is_err());
        assert!(Term::parse_canonical("\"x\"@").is_err());
        assert!(Term::parse_canonical("\"x\"junk").is_err());
        assert!(Term::parse_canonical("\"\\q\"").is_err());
        assert!(Term::parse_canonical("plain").is_err());
    }

    #[test]
    fn test_validate_rejects_lossy_terms() {
        let both = Term::Literal {
            value: "v".to_string(),
            language: Some("en".to_string()),
            datatype: Some("http://www.w3.org/2001/XMLSchema#integer".to_string()),
        };

        for term in [both, Term::blank_node(""), Term::lang_literal("v", "")] {
            assert!(matches!(term.validate(), Err(DictError::UnsupportedTerm(_))));
        }

        assert!(Term::blank_node("b0").validate().is_ok());
        assert!(Term::literal("").validate().is_ok());
        assert!(Term::iri("").validate().is_ok());
    }

    #[test]
    fn test_split_iri() {
        assert_eq!(
            Term::split_iri("http://xmlns.com/foaf/0.1/name"),
            ("http://xmlns.com/foaf/0.1/", "name")
        );
        assert_eq!(
            Term::split_iri("http://www.w3.org/2000/01/rdf-schema#label"),
            ("http://www.w3.org/2000/01/rdf-schema#", "label")
        );
        assert_eq!(Term::split_iri("urn:isbn:123"), ("urn:isbn:", "123"));
        assert_eq!(Term::split_iri("nothing"), ("", "nothing"));
        assert_eq!(
            Term::split_iri("http://example.org/ns/"),
            ("http://example.org/ns/", "")
        );
    }

    #[test]
    fn test_term_kind_markers() {
        for kind in [TermKind::Resource, TermKind::BlankNode, TermKind::Literal] {
            assert_eq!(TermKind::from_marker(kind.marker()), Some(kind));
        }
        assert_eq!(TermKind::from_marker(0), None);
        assert_eq!(Term::literal("x").kind(), TermKind::Literal);
    }
}
