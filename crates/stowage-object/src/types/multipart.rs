//! Multipart session and object descriptors.

use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

/// Opaque identifier of an open multipart upload session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref, Display, From)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultipartId(String);

impl MultipartId {
    /// Wrap a store-issued session identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Receipt for one uploaded part, needed to complete the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// 1-based position of the part within the object.
    pub part_number: u32,
    /// Entity tag returned by the store for this part.
    pub e_tag: String,
}

/// Metadata returned by a successful existence check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    /// Object size in bytes.
    pub size: u64,
    /// Entity tag, if the backend provides one.
    pub e_tag: Option<String>,
    /// MIME content-type, if the backend provides one.
    pub content_type: Option<String>,
}
