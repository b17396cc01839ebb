//! Object response types.

use serde::{Deserialize, Serialize};
use stowage_storage::UploadOutput;

/// Body returned after a successful upload.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    /// Key the object was stored under.
    pub key: String,
    /// Stored size in bytes.
    pub size: u64,
}

impl From<UploadOutput> for UploadedObject {
    fn from(output: UploadOutput) -> Self {
        Self {
            key: output.key,
            size: output.size,
        }
    }
}
