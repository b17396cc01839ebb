//! Storage error to HTTP error conversion.
//!
//! The client sees the status and a generic message. The store's own error
//! text only travels in the context, which is logged and never serialized.

use stowage_storage::StorageError;

use super::http_error::{Error as HttpError, ErrorKind};

impl From<StorageError> for HttpError<'static> {
    fn from(error: StorageError) -> Self {
        let context = error.to_string();
        match error {
            StorageError::Conflict { key, .. } => ErrorKind::Conflict
                .with_message("An object with this key already exists")
                .with_resource(key)
                .with_context(context),

            StorageError::NotFound { key, .. } => ErrorKind::NotFound
                .with_message("Object not found")
                .with_resource(key)
                .with_context(context),

            StorageError::Transfer { call, .. } => ErrorKind::InternalServerError
                .with_message("Object store request failed")
                .with_context(format!("{context} (call: {call})")),

            StorageError::Unknown(_) => ErrorKind::InternalServerError.with_context(context),
        }
    }
}
