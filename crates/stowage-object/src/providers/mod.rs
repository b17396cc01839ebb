//! Object storage backends.

mod memory;
mod s3;

pub use memory::{MIN_PART_SIZE, MemoryProvider, MemoryStats};
pub use s3::{S3Credentials, S3Provider};
