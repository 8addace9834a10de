//! Error types for tokstream.

use std::fmt;

use thiserror::Error;

use crate::token::{Kind, Token};

/// Errors that can abort a traversal.
#[derive(Debug, Error)]
pub enum Error {
    /// A value could not be turned into tokens.
    #[error("marshal error at {path}: {reason}")]
    Marshal { reason: Reason, path: Path },

    /// A token stream did not fit its destination.
    #[error("unmarshal error at {path}: {reason}")]
    Unmarshal { reason: Reason, path: Path },

    /// A string or bytes payload declared a length over the decode ceiling.
    #[error("declared length {len} is too long")]
    TooLong { len: u64 },

    #[error("malformed length varint")]
    MalformedVarint,

    #[error("unknown kind byte: {0}")]
    UnknownKind(u8),

    #[error("string payload is not valid utf-8")]
    InvalidUtf8,

    /// No subtree with the requested hash exists.
    #[error("hash not found")]
    NotFound,

    /// A function called with decoded arguments returned an error.
    #[error("callback error: {0}")]
    Callback(Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The shape failure reason, if this is a marshal or unmarshal error.
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Error::Marshal { reason, .. } | Error::Unmarshal { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// The diagnostic path, if this is a marshal or unmarshal error.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::Marshal { path, .. } | Error::Unmarshal { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Why a value and a stream did not fit together.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Reason {
    #[error("expecting {0}")]
    ExpectingKind(Kind),

    /// The stream ended or closed a container where a value was required.
    #[error("expecting value")]
    ExpectingValue,

    #[error("unknown field name: {0}")]
    UnknownFieldName(String),

    #[error("duplicate field: {0}")]
    DuplicateField(String),

    #[error("too many elements")]
    TooManyElement,

    #[error("bad map key")]
    BadMapKey,

    #[error("cyclic pointer")]
    CyclicPointer,

    #[error("unexpected end token")]
    UnexpectedEndToken,

    #[error("missing end token")]
    MissingEnd,

    #[error("more than one value")]
    MoreThanOneValue,

    #[error("unexpected hash token")]
    UnexpectedHashToken,

    #[error("unregistered type: {0}")]
    UnregisteredType(String),

    #[error("type name mismatch: expecting {expected}, got {got}")]
    TypeNameMismatch { expected: String, got: String },

    /// A text or binary fallback rejected its payload.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl Reason {
    /// The reason to report for an unexpected token.
    ///
    /// Hash tags and end markers get their own reasons; everything else is
    /// reported as a mismatch against `expected`.
    pub fn unexpected(token: Option<&Token>, expected: Kind) -> Self {
        match token {
            None => Reason::ExpectingValue,
            Some(token) if token.kind() == Kind::Hash => Reason::UnexpectedHashToken,
            Some(token) if token.is_end() => Reason::ExpectingValue,
            Some(_) => Reason::ExpectingKind(expected),
        }
    }
}

/// One step of a diagnostic path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Array, slice or tuple index.
    Index(usize),
    /// Struct field name.
    Field(String),
    /// Map key (first token of the key).
    Key(Token),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Index(i) => write!(f, "{i}"),
            Segment::Field(name) => f.write_str(name),
            Segment::Key(token) => write!(f, "{token}"),
        }
    }
}

/// A rendered traversal path, root first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path(pub Vec<Segment>);

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Result type for tokstream operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let path = Path(vec![Segment::Index(42), Segment::Index(43)]);
        assert_eq!(path.to_string(), "/42/43");

        let path = Path(vec![
            Segment::Field("items".into()),
            Segment::Key(Token::String("a".into())),
        ]);
        assert_eq!(path.to_string(), "/items/a");

        assert_eq!(Path::default().to_string(), "/");
    }

    #[test]
    fn test_error_display() {
        let err = Error::Unmarshal {
            reason: Reason::ExpectingKind(Kind::Int),
            path: Path(vec![Segment::Index(1)]),
        };
        assert_eq!(err.to_string(), "unmarshal error at /1: expecting int");
        assert_eq!(err.reason(), Some(&Reason::ExpectingKind(Kind::Int)));
    }

    #[test]
    fn test_unexpected_reason() {
        assert_eq!(Reason::unexpected(None, Kind::Int), Reason::ExpectingValue);
        assert_eq!(
            Reason::unexpected(Some(&Token::Hash(Default::default())), Kind::Int),
            Reason::UnexpectedHashToken
        );
        assert_eq!(
            Reason::unexpected(Some(&Token::ArrayEnd), Kind::Int),
            Reason::ExpectingValue
        );
        assert_eq!(
            Reason::unexpected(Some(&Token::Bool(true)), Kind::Int),
            Reason::ExpectingKind(Kind::Int)
        );
    }
}
