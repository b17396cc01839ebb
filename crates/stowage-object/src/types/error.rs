//! Lightweight error type shared by every backend.

use std::fmt;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for object-store calls.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse category of an object-store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The object, bucket, or multipart session does not exist.
    NotFound,
    /// The request was rejected before reaching the store.
    InvalidInput,
    /// The store could not be reached or the connection broke.
    Connection,
    /// The store answered with a failure.
    Runtime,
}

/// An error carrying a kind, a message, an optional source, and a
/// retryable flag.
pub struct Error {
    kind: ErrorKind,
    message: String,
    source: Option<BoxedError>,
    retryable: bool,
}

impl Error {
    fn new(kind: ErrorKind, msg: impl fmt::Display, label: &str, retryable: bool) -> Self {
        Self {
            kind,
            message: format!("[{label}] {msg}"),
            source: None,
            retryable,
        }
    }

    /// Create a not-found error formatted as `[{label}] {msg}`.
    pub fn not_found(msg: impl fmt::Display, label: &str) -> Self {
        Self::new(ErrorKind::NotFound, msg, label, false)
    }

    /// Create an invalid-input error formatted as `[{label}] {msg}`.
    pub fn invalid_input(msg: impl fmt::Display, label: &str) -> Self {
        Self::new(ErrorKind::InvalidInput, msg, label, false)
    }

    /// Create a runtime error formatted as `[{label}] {msg}`.
    pub fn runtime(msg: impl fmt::Display, label: &str, retryable: bool) -> Self {
        Self::new(ErrorKind::Runtime, msg, label, retryable)
    }

    /// Create a connection error formatted as `[{label}] {msg}`.
    pub fn connection(msg: impl fmt::Display, label: &str, retryable: bool) -> Self {
        Self::new(ErrorKind::Connection, msg, label, retryable)
    }

    /// Attach a source error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Category of this failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether the store reported the target as absent.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Whether the caller should retry this operation.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("retryable", &self.retryable)
            .field("source", &self.source)
            .finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
