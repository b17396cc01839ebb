//! Result type for
//! [`ObjectClient::complete_multipart`](super::ObjectClient::complete_multipart).

/// Result of a successfully committed multipart session.
#[derive(Debug, Clone, Default)]
pub struct PutOutput {
    /// Entity tag of the newly created object, if the backend provides one.
    pub e_tag: Option<String>,
    /// Version of the newly created object, if the backend provides one.
    pub version: Option<String>,
}
