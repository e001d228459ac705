//! Error types for the kalup-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes.

use thiserror::Error;

/// Result type alias for kalup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all kalup operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Too few bytes remain to satisfy a fixed-width read
    #[error("insufficient bytes at `{path}` (offset {offset}): needed {needed}, {available} available")]
    InsufficientMemory {
        /// Field-access path of the read that failed
        path: String,
        /// Byte offset at which the read started
        offset: usize,
        /// Number of bytes the read required
        needed: usize,
        /// Number of bytes actually available
        available: usize,
    },

    /// Unconsumed trailing bytes after an unpack completed
    #[error("excess bytes at `{path}`: consumed {consumed} of {total}")]
    ExcessMemory {
        /// Field-access path of the unpack that left bytes behind
        path: String,
        /// Number of bytes consumed
        consumed: usize,
        /// Number of bytes that were available
        total: usize,
    },

    /// Value does not fit the schema: out of range, wrong type, wrong arity
    #[error("cannot encode `{path}` as {kind}: {details}")]
    Encoding {
        /// Field-access path of the value that failed to encode
        path: String,
        /// Type hint of the transform that rejected the value
        kind: String,
        /// Detailed description of the issue
        details: String,
    },

    /// Raw bytes do not decode to a legal value
    #[error("cannot decode `{path}` as {kind} (offset {offset}): {details}")]
    Decoding {
        /// Field-access path of the field that failed to decode
        path: String,
        /// Type hint of the transform that rejected the bytes
        kind: String,
        /// Byte offset at which the field started
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Operation required a fixed size but the schema is variable
    #[error("schema has no fixed size: {details}")]
    Size {
        /// Description of the schema that has no fixed size
        details: String,
    },

    /// Schema definition is invalid (caught at build time, not per call)
    #[error("invalid schema: {details}")]
    Schema {
        /// Description of the defect in the schema definition
        details: String,
    },

    /// Diagnostic and non-diagnostic passes disagree, or a custom transform
    /// violated its contract
    #[error("implementation defect: {details}")]
    Implementation {
        /// Description of the defect
        details: String,
    },

    /// A failure enriched with a rendered diagnostic dump
    #[error("{source}\n{dump}")]
    Detailed {
        /// The underlying failure
        #[source]
        source: Box<Error>,
        /// Rendered dump table describing the walk up to the failure
        dump: String,
    },
}

impl Error {
    /// Creates a new insufficient-memory error
    pub fn insufficient(
        path: impl Into<String>,
        offset: usize,
        needed: usize,
        available: usize,
    ) -> Self {
        Self::InsufficientMemory {
            path: display_path(path),
            offset,
            needed,
            available,
        }
    }

    /// Creates a new excess-memory error
    pub fn excess(path: impl Into<String>, consumed: usize, total: usize) -> Self {
        Self::ExcessMemory {
            path: display_path(path),
            consumed,
            total,
        }
    }

    /// Creates a new encoding error
    pub fn encoding(
        path: impl Into<String>,
        kind: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::Encoding {
            path: display_path(path),
            kind: kind.into(),
            details: details.into(),
        }
    }

    /// Creates a new decoding error
    pub fn decoding(
        path: impl Into<String>,
        kind: impl Into<String>,
        offset: usize,
        details: impl Into<String>,
    ) -> Self {
        Self::Decoding {
            path: display_path(path),
            kind: kind.into(),
            offset,
            details: details.into(),
        }
    }

    /// Creates a new size error
    pub fn size(details: impl Into<String>) -> Self {
        Self::Size {
            details: details.into(),
        }
    }

    /// Creates a new schema error
    pub fn schema(details: impl Into<String>) -> Self {
        Self::Schema {
            details: details.into(),
        }
    }

    /// Creates a new implementation-defect error
    pub fn implementation(details: impl Into<String>) -> Self {
        Self::Implementation {
            details: details.into(),
        }
    }

    /// Wraps an error with a rendered diagnostic dump
    pub fn with_dump(source: Error, dump: impl Into<String>) -> Self {
        Self::Detailed {
            source: Box::new(source),
            dump: dump.into(),
        }
    }

    /// Returns the underlying error, unwrapping any dump enrichment
    pub fn canonical(&self) -> &Error {
        match self {
            Self::Detailed { source, .. } => source.canonical(),
            other => other,
        }
    }

    /// Returns true if this is (or wraps) an insufficient-memory error
    pub fn is_insufficient(&self) -> bool {
        matches!(self.canonical(), Self::InsufficientMemory { .. })
    }

    /// Returns true if this is (or wraps) an excess-memory error
    pub fn is_excess(&self) -> bool {
        matches!(self.canonical(), Self::ExcessMemory { .. })
    }
}

/// Substitute the top-level marker for an empty access path
fn display_path(path: impl Into<String>) -> String {
    let path = path.into();
    if path.is_empty() {
        "(top)".to_string()
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::insufficient(".hdr.len", 4, 2, 1);
        assert!(err.to_string().contains("insufficient bytes"));
        assert!(err.to_string().contains(".hdr.len"));
        assert!(err.to_string().contains("needed 2"));
    }

    #[test]
    fn test_empty_path_marker() {
        let err = Error::excess("", 4, 6);
        assert!(err.to_string().contains("(top)"));
    }

    #[test]
    fn test_canonical_unwraps_dump() {
        let inner = Error::decoding(".code", "u8", 0, "unknown enumerant 7");
        let wrapped = Error::with_dump(inner, "| dump table |");
        assert!(matches!(
            wrapped.canonical(),
            Error::Decoding { offset: 0, .. }
        ));
        assert!(wrapped.to_string().contains("dump table"));
    }

    #[test]
    fn test_predicates() {
        assert!(Error::insufficient("x", 0, 2, 0).is_insufficient());
        let wrapped = Error::with_dump(Error::excess("x", 1, 2), "dump");
        assert!(wrapped.is_excess());
        assert!(!wrapped.is_insufficient());
    }
}
