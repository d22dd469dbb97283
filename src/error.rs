//!
//! Error codes
//!

use std::fmt::Display;

/// Errors produced while building, (de)serializing or deriving symbolic regexes.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Error {
    /// A contract on the arguments was violated, e.g. a loop with `lower > upper`.
    InvalidArgument(String),

    /// A value does not fit the bit budget of the serialization format.
    SerializationLimitExceeded(String),

    /// A serialized payload is corrupt or truncated.
    Deserialization(String),

    /// A regex nests deeper than the configured bound.
    PatternTooComplex { depth: usize },

    /// An operation that needs an element was applied to the empty set.
    EmptySet,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::SerializationLimitExceeded(msg) => write!(f, "serialization limit exceeded: {}", msg),
            Self::Deserialization(msg) => write!(f, "deserialization error: {}", msg),
            Self::PatternTooComplex { depth } => write!(f, "pattern too complex: nesting depth exceeds {}", depth),
            Self::EmptySet => "operation undefined on the empty set".fmt(f),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for a [`Error::Deserialization`] error.
pub(crate) fn malformed<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::Deserialization(msg.into()))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::InvalidArgument("lower > upper".to_string()).to_string(),
            "invalid argument: lower > upper"
        );
        assert_eq!(
            Error::PatternTooComplex { depth: 10 }.to_string(),
            "pattern too complex: nesting depth exceeds 10"
        );
        assert_eq!(Error::EmptySet.to_string(), "operation undefined on the empty set");
        let err: Result<()> = malformed("bad id");
        assert_eq!(err, Err(Error::Deserialization("bad id".to_string())));
    }
}
