//! Convenience re-exports.

pub use crate::conventions::OperationName;
pub use crate::{
    ErrorKind, Pacing, Result, Storage, StorageConfig, StorageError, StorageTelemetry,
    UploadOutput,
};
