//! veap-server - HTTP server layer for VEAP
//!
//! Serves a [`veap_core::Service`] over HTTP/JSON. The whole VEAP tree is
//! handled by a single catch-all route so that arbitrary escaped object
//! paths reach the dispatcher verbatim.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use veap_core::DefaultMetaService;
//! use veap_server::{router, Handler};
//!
//! let service = DefaultMetaService::new(backend);
//! let handler = Arc::new(Handler::new(Arc::new(service)));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:2121").await?;
//! axum::serve(listener, router(handler)).await?;
//! ```

pub mod handler;
pub mod stats;

pub use handler::{Handler, DEFAULT_HISTORY_SIZE_LIMIT, DEFAULT_REQUEST_SIZE_LIMIT};
pub use stats::HandlerStats;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Creates the axum router serving the VEAP protocol with the given handler.
pub fn router(handler: Arc<Handler>) -> Router {
    Router::new()
        .fallback(serve)
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn serve(State(handler): State<Arc<Handler>>, request: Request) -> Response {
    handler.handle(request).await
}
