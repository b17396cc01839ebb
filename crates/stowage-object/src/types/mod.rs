//! Error and multipart descriptor types.

pub mod error;
pub mod multipart;

pub use error::{Error, ErrorKind, Result};
pub use multipart::{CompletedPart, MultipartId, ObjectHead};
