//! Middleware for `axum::Router`.
//!
//! ```rust,ignore
//! use stowage_server::middleware::RouterExt;
//!
//! let app = routes(state)
//!     .with_body_limit(64 * 1024 * 1024)
//!     .with_recovery()
//!     .with_observability();
//! ```

mod observability;
mod recovery;

use axum::Router;
use axum::extract::DefaultBodyLimit;

/// Tracing target for panic recovery.
pub(crate) const TRACING_TARGET_PANIC: &str = "stowage_server::middleware::panic";

/// Tracing target for request spans and response events.
pub(crate) const TRACING_TARGET_HTTP: &str = "stowage_server::middleware::http";

/// Extension trait for `axum::`[`Router`] for layering middleware.
pub trait RouterExt<S> {
    /// Layers [`SetRequestId`], [`Trace`] and [`PropagateRequestId`] middlewares.
    ///
    /// Request spans are named `"{method} {route}"` and carry `otel.kind =
    /// "server"`.
    ///
    /// [`SetRequestId`]: tower_http::request_id::SetRequestIdLayer
    /// [`Trace`]: tower_http::trace::TraceLayer
    /// [`PropagateRequestId`]: tower_http::request_id::PropagateRequestIdLayer
    fn with_observability(self) -> Self;

    /// Layers [`CatchPanic`], turning a handler panic into a JSON `500`.
    ///
    /// [`CatchPanic`]: tower_http::catch_panic::CatchPanicLayer
    fn with_recovery(self) -> Self;

    /// Caps request bodies at `limit` bytes. Larger uploads get a `413`.
    fn with_body_limit(self, limit: usize) -> Self;
}

impl<S> RouterExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self) -> Self {
        observability::layer(self)
    }

    fn with_recovery(self) -> Self {
        recovery::layer(self)
    }

    fn with_body_limit(self, limit: usize) -> Self {
        self.layer(DefaultBodyLimit::max(limit))
    }
}
