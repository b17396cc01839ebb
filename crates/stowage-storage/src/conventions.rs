//! Attribute keys, instrument names, and units emitted by the storage layer.
//!
//! These strings form a contract with dashboards and alerts and must not
//! change without a migration plan.

use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Name of the bucket the operation targets.
pub const STORAGE_BUCKET: &str = "storage.bucket";
/// Key of the object the operation targets. Emitted on spans only.
pub const STORAGE_OBJECT_KEY: &str = "storage.object.key";
/// Logical operation name, one of [`OperationName`].
pub const STORAGE_OPERATION_NAME: &str = "storage.operation.name";
/// Hostname of the object store endpoint.
pub const SERVER_ADDRESS: &str = "server.address";
/// Port of the object store endpoint.
pub const SERVER_PORT: &str = "server.port";
/// Closed error classification, set only on failure.
pub const ERROR_TYPE: &str = "error.type";

/// Duration histogram name.
pub const OPERATION_DURATION: &str = "storage.client.operation.duration";
/// Duration histogram description.
pub const OPERATION_DURATION_DESCRIPTION: &str = "Duration of storage client operation.";
/// Duration histogram unit.
pub const OPERATION_DURATION_UNIT: &str = "s";

/// Active-operation counter name.
pub const OPERATION_ACTIVE: &str = "storage.client.operation.active";
/// Active-operation counter description.
pub const OPERATION_ACTIVE_DESCRIPTION: &str = "Number of active storage client operations.";
/// Active-operation counter unit.
pub const OPERATION_ACTIVE_UNIT: &str = "{operation}";

/// Explicit bucket boundaries of the duration histogram, in seconds.
pub const DURATION_BOUNDARIES: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Instrumentation scope used when instruments come from the global providers.
pub const INSTRUMENTATION_SCOPE: &str = "stowage-storage";

/// Size of every multipart chunk except the last (5 MiB).
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// Highest part number an S3-compatible store accepts.
pub const MAX_PARTS: usize = 10_000;

/// Logical storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum OperationName {
    /// Create-once multipart upload.
    Upload,
    /// Whole-object retrieval.
    Download,
}

impl OperationName {
    /// Returns the attribute value for this operation.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn operation_names() {
        assert_eq!(OperationName::Upload.as_str(), "upload");
        assert_eq!(OperationName::Download.to_string(), "download");
        assert_eq!(
            OperationName::from_str("upload").ok(),
            Some(OperationName::Upload)
        );
    }

    #[test]
    fn boundaries_are_ascending() {
        assert!(DURATION_BOUNDARIES.windows(2).all(|w| w[0] < w[1]));
    }
}
