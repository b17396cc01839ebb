//! Liveness endpoint.

use axum::routing::get;
use axum::{Json, Router};

use super::response::HealthStatus;
use crate::service::ServiceState;

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "stowage_server::handler::monitors";

#[tracing::instrument(skip_all)]
async fn health_status() -> Json<HealthStatus> {
    tracing::trace!(target: TRACING_TARGET, "health check");
    Json(HealthStatus::default())
}

pub fn routes() -> Router<ServiceState> {
    Router::new().route("/", get(health_status))
}
