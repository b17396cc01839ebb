//! Result type for [`ObjectClient::get`](super::ObjectClient::get).

use bytes::Bytes;

/// Result of a successful [`ObjectClient::get`](super::ObjectClient::get) call.
#[derive(Debug, Clone)]
pub struct GetOutput {
    /// Raw bytes of the retrieved object.
    pub data: Bytes,
    /// MIME content-type, if the backend provides one.
    pub content_type: Option<String>,
    /// Entity tag, if the backend provides one.
    pub e_tag: Option<String>,
}

impl GetOutput {
    /// Size of the retrieved object in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
