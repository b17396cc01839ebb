//! Storage error taxonomy.

use strum::{AsRefStr, Display, IntoStaticStr};

/// Result type for storage operations.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// Closed classification of storage failures.
///
/// The string form is the value of the `error.type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// The key already exists at upload time.
    #[strum(serialize = "ConflictError")]
    Conflict,
    /// The key is absent at download time.
    #[strum(serialize = "NotFoundError")]
    NotFound,
    /// A store call failed while moving data.
    #[strum(serialize = "TransferError")]
    Transfer,
    /// Anything else, including cancellation.
    #[strum(serialize = "UnknownError")]
    Unknown,
}

impl ErrorKind {
    /// Returns the `error.type` attribute value.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Error returned by [`Storage`](crate::Storage) operations.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors should be handled appropriately"]
pub enum StorageError {
    /// An object with the key already exists.
    #[error("Object with key '{key}' already exists in bucket '{bucket}'")]
    Conflict {
        /// Target bucket.
        bucket: String,
        /// Rejected key.
        key: String,
    },

    /// No object exists under the key.
    #[error("Object with key '{key}' does not exist in bucket '{bucket}'")]
    NotFound {
        /// Target bucket.
        bucket: String,
        /// Missing key.
        key: String,
        /// Store-reported absence.
        #[source]
        source: stowage_object::Error,
    },

    /// A store call failed while probing, moving, or committing data.
    ///
    /// When the failure happened inside an open multipart session and the
    /// follow-up abort failed too, the abort failure is kept in `abort`.
    #[error("{call} failed: {source}{}", abort_suffix(.abort.as_deref()))]
    Transfer {
        /// Store call that failed.
        call: &'static str,
        /// Failure reported by the store.
        #[source]
        source: stowage_object::Error,
        /// Failure of the abort issued after `source`.
        abort: Option<Box<stowage_object::Error>>,
    },

    /// Failure outside the other categories.
    #[error("{0}")]
    Unknown(String),
}

fn abort_suffix(abort: Option<&stowage_object::Error>) -> String {
    abort
        .map(|e| format!("; abort also failed: {e}"))
        .unwrap_or_default()
}

impl StorageError {
    pub(crate) fn transfer(call: &'static str, source: stowage_object::Error) -> Self {
        Self::Transfer {
            call,
            source,
            abort: None,
        }
    }

    /// Classification used for the `error.type` attribute.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Failure of the abort that followed a failed transfer, if any.
    pub fn abort_error(&self) -> Option<&stowage_object::Error> {
        match self {
            Self::Transfer { abort, .. } => abort.as_deref(),
            _ => None,
        }
    }

    /// Whether repeating the call might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transfer { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// A failed store call inside an open multipart session, awaiting the
/// outcome of the abort that must follow it.
///
/// Only this type can carry an abort failure into [`StorageError`], so an
/// abort error always lands on a [`StorageError::Transfer`].
#[derive(Debug)]
pub(crate) struct TransferFailure {
    pub call: &'static str,
    pub source: stowage_object::Error,
}

impl TransferFailure {
    pub fn new(call: &'static str, source: stowage_object::Error) -> Self {
        Self { call, source }
    }

    /// Classify the failure together with the abort that followed it.
    pub fn into_error(self, abort: Option<stowage_object::Error>) -> StorageError {
        StorageError::Transfer {
            call: self.call,
            source: self.source,
            abort: abort.map(Box::new),
        }
    }
}

impl From<TransferFailure> for StorageError {
    fn from(failure: TransferFailure) -> Self {
        failure.into_error(None)
    }
}

/// Invalid storage configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The bucket name is empty.
    #[error("bucket name must not be empty")]
    EmptyBucket,

    /// The endpoint URL does not parse or has no host.
    #[error("invalid endpoint url '{url}': {reason}")]
    InvalidEndpoint {
        /// Rejected URL.
        url: String,
        /// Parse failure.
        reason: String,
    },

    /// The pacing bounds are inverted.
    #[error("pacing minimum {min_ms}ms exceeds maximum {max_ms}ms")]
    InvalidPacing {
        /// Lower bound in milliseconds.
        min_ms: u64,
        /// Upper bound in milliseconds.
        max_ms: u64,
    },

    /// Part concurrency must be at least one.
    #[error("part concurrency must be at least 1")]
    ZeroConcurrency,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_error() -> stowage_object::Error {
        stowage_object::Error::runtime("injected failure: upload_part", "memory", true)
    }

    #[test]
    fn error_type_strings() {
        assert_eq!(ErrorKind::Conflict.as_str(), "ConflictError");
        assert_eq!(ErrorKind::NotFound.as_str(), "NotFoundError");
        assert_eq!(ErrorKind::Transfer.as_str(), "TransferError");
        assert_eq!(ErrorKind::Unknown.to_string(), "UnknownError");
    }

    #[test]
    fn conflict_message() {
        let err = StorageError::Conflict {
            bucket: "demo".into(),
            key: "a.bin".into(),
        };
        assert_eq!(
            err.to_string(),
            "Object with key 'a.bin' already exists in bucket 'demo'"
        );
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn abort_failure_is_attached() {
        let abort = stowage_object::Error::runtime("injected failure: abort", "memory", false);
        let err = TransferFailure::new("upload_part", store_error()).into_error(Some(abort));

        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert!(err.is_retryable());
        assert!(err.abort_error().is_some());
        assert_eq!(
            err.to_string(),
            "upload_part failed: [memory] injected failure: upload_part; \
             abort also failed: [memory] injected failure: abort"
        );
    }

    #[test]
    fn clean_abort_leaves_only_the_cause() {
        let err: StorageError = TransferFailure::new("upload_part", store_error()).into();
        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert!(err.abort_error().is_none());
        assert_eq!(
            err.to_string(),
            "upload_part failed: [memory] injected failure: upload_part"
        );
    }
}
