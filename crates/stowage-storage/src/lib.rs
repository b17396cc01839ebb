#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging
pub const TRACING_TARGET_STORAGE: &str = "stowage_storage::storage";
pub const TRACING_TARGET_OPERATIONS: &str = "stowage_storage::operations";
pub const TRACING_TARGET_TELEMETRY: &str = "stowage_storage::telemetry";

pub mod conventions;
mod error;
mod operations;
mod storage;
pub mod telemetry;

#[doc(hidden)]
pub mod prelude;

pub use crate::error::{ConfigError, ErrorKind, Result, StorageError};
pub use crate::operations::{Pacing, UploadOutput};
pub use crate::storage::{Storage, StorageConfig};
pub use crate::telemetry::{ServerEndpoint, StorageTelemetry};
