//! Convenience re-exports.

pub use crate::client::{GetOutput, ObjectBackend, ObjectClient, PutOutput};
pub use crate::providers::{MemoryProvider, S3Credentials, S3Provider};
pub use crate::types::{CompletedPart, Error, ErrorKind, MultipartId, ObjectHead};
