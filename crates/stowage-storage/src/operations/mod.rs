//! Upload and download pipelines.
//!
//! The pipelines only talk to the object store. Telemetry is applied around
//! them by [`Storage`](crate::Storage).

mod download;
mod pacing;
mod session;
mod upload;

use stowage_object::ObjectClient;

pub(crate) use self::download::download;
pub use self::pacing::Pacing;
pub(crate) use self::pacing::saturating_millis;
pub use self::upload::UploadOutput;
pub(crate) use self::upload::upload;

/// Store handle and bucket a pipeline runs against.
#[derive(Clone, Copy)]
pub(crate) struct Target<'a> {
    pub client: &'a ObjectClient,
    pub bucket: &'a str,
}

/// Transfer tuning for the upload pipeline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TransferOptions {
    pub part_concurrency: usize,
    pub pacing: Pacing,
}
