use serde::{Deserialize, Serialize};

/// Liveness response body.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "ok".to_owned(),
        }
    }
}
