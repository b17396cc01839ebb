//! HTTP routes and their handlers.
//!
//! [`routes`] assembles the full router; every handler returns
//! [`Result`] so store failures render through [`Error`].

mod error;
mod monitors;
mod objects;
pub mod response;

use axum::Router;
use axum::http::Uri;

pub use self::error::{Error, ErrorKind, Result};
use crate::service::ServiceState;

/// Tracing target for error responses.
pub(crate) const TRACING_TARGET_ERROR: &str = "stowage_server::handler::error";

/// Builds the router with every route and the not-found fallback.
pub fn routes(state: ServiceState) -> Router {
    Router::new()
        .merge(monitors::routes())
        .merge(objects::routes())
        .fallback(fallback)
        .with_state(state)
}

async fn fallback(uri: Uri) -> Error<'static> {
    ErrorKind::NotFound
        .with_message("No route matches the request path")
        .with_resource(uri.path().to_owned())
}
