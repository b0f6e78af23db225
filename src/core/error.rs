use std::fmt;

/// Coarse classification of what went wrong, mirrored onto whatever status
/// code a transport layer wants to give it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: unknown metric, empty filter group, `k` out of range, ...
    Validation,
    /// An operation referenced an identity that doesn't exist.
    NotFound,
    /// An embedding's length disagreed with the library's established dimension.
    DimensionMismatch,
    /// Search or index build was requested against a library with zero chunks.
    EmptyLibrary,
    /// A caller-supplied identity collided with one already stored.
    Integrity,
    /// An invariant the core is supposed to maintain was found broken.
    Internal,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
        }
    }

    pub fn validation(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Validation, context)
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context)
    }

    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Error::new(
            ErrorKind::DimensionMismatch,
            format!("expected dimension {expected}, got {actual}"),
        )
    }

    pub fn empty_library(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::EmptyLibrary, context)
    }

    pub fn integrity(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Integrity, context)
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Internal, context)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Validation, format!("metadata JSON error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
