//! Centralized error handling for objgraph.
//!
//! Every fallible operation in the crate returns [`Result<T>`], and every failure
//! maps to one [`GraphError`] variant. Nothing in the library panics on bad input:
//! a malformed document, an unknown class or an unencodable value is always
//! reported back to the caller.
//!
//! ## Error Categories
//!
//! - **Registry** ([`GraphError::InvalidRegistration`], [`GraphError::UnknownType`]):
//!   bad class names at registration time, or names that were never registered.
//! - **Encoding** ([`GraphError::UnsupportedType`],
//!   [`GraphError::UnsupportedConstructorArgument`]): a value whose kind has no
//!   wire representation.
//! - **Decoding** ([`GraphError::MalformedInput`], [`GraphError::DanglingReference`]):
//!   text that is not a well-formed document.
//! - **Construction** ([`GraphError::Construction`]): a class constructor rejected
//!   its arguments.
//! - **I/O** ([`GraphError::Io`]): file helpers only.
//!
//! ## Usage
//!
//! ```rust
//! use objgraph::{GraphError, GraphSerializer, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! let serializer = GraphSerializer::new(&registry);
//!
//! match serializer.deserialize("not json") {
//!     Err(GraphError::MalformedInput(reason)) => eprintln!("bad document: {reason}"),
//!     Err(e) => eprintln!("other error: {e}"),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// A specialized `Result` type for objgraph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// The master error enum covering all failure domains.
///
/// `Clone` so that a failure can be kept next to the document that caused it.
/// I/O errors are wrapped in an `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// A class was registered with an empty name.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    /// A document names a class that is not in the registry.
    #[error("unknown type: {0:?} is not registered")]
    UnknownType(String),

    /// A value reached during serialization has no encoding.
    #[error("unsupported type: {kind}")]
    UnsupportedType {
        /// Runtime kind name of the offending value, e.g. `Function`.
        kind: String,
    },

    /// A constructor argument has no encoding.
    #[error("unsupported constructor argument #{position} for {class}: {kind}")]
    UnsupportedConstructorArgument {
        /// Class being constructed.
        class: String,
        /// Zero-based argument position.
        position: usize,
        /// Runtime kind name of the offending value.
        kind: String,
    },

    /// The text is not JSON, or not shaped like a serialized graph.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A `ref` node points at an id that has not been materialized yet.
    #[error("dangling reference: id {0} was never defined before use")]
    DanglingReference(u32),

    /// A class constructor rejected its arguments.
    #[error("construction of {class} failed: {reason}")]
    Construction {
        /// Class being constructed.
        class: String,
        /// Reason given by the constructor.
        reason: String,
    },

    /// Low-level I/O failure in the file helpers.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),
}

impl GraphError {
    /// Shorthand for [`GraphError::MalformedInput`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput(reason.into())
    }

    /// Shorthand for [`GraphError::UnsupportedType`].
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedType { kind: kind.into() }
    }

    /// Shorthand used by constructors to reject their arguments.
    pub fn construction(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            class: class.into(),
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for GraphError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_errors_keep_their_source() {
        let err = GraphError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn json_errors_become_malformed_input() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").expect_err("truncated JSON must not parse");
        assert!(matches!(GraphError::from(json_err), GraphError::MalformedInput(_)));
    }
}
