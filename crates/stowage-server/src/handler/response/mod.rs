//! Response bodies returned by the handlers.

mod error_response;
mod monitors;
mod objects;

pub use error_response::ErrorResponse;
pub use monitors::HealthStatus;
pub use objects::UploadedObject;
