#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod client;
/// Object storage backends (S3-compatible, in-memory).
pub mod providers;
/// Shared types (Error, multipart descriptors).
pub mod types;

#[doc(hidden)]
pub mod prelude;

pub use client::{GetOutput, ObjectBackend, ObjectClient, PutOutput};
pub use providers::{MIN_PART_SIZE, MemoryProvider, MemoryStats, S3Credentials, S3Provider};
pub use types::{CompletedPart, Error, ErrorKind, MultipartId, ObjectHead, Result};

/// Tracing target for object-store calls.
pub const TRACING_TARGET: &str = "stowage_object";

#[cfg(test)]
mod tests {
    use crate::{MemoryProvider, ObjectClient, S3Credentials};

    #[test]
    fn providers_are_reachable_from_the_root() {
        let client = ObjectClient::new(MemoryProvider::new());
        assert_eq!(client.backend_id(), "memory");
        assert_eq!(S3Credentials::default().region, "");
    }
}
