//! HTTP surface of pushgate
//!
//! - every path outside `/api/v1` is a proxied git smart-HTTP request, see
//!   [`proxy::proxy_handler`];
//! - `/api/v1/push..` lists and decides pushes held for review.
//!
//! # Example
//!
//! ```no_run
//! use pushgate_config::Config;
//! use pushgate_core::{Chain, MemoryStore, PluginRegistry, ProxyContext};
//! use pushgate_server::{create_router, AppState};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ctx = ProxyContext::new(Config::default(), Arc::new(MemoryStore::new()))?;
//! let state = Arc::new(AppState::new(Chain::new(ctx, &PluginRegistry::new()))?);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, create_router(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod forward;
pub mod proxy;
pub mod security;
pub mod state;
pub mod telemetry;

pub use error::ApiError;
pub use state::AppState;
pub use telemetry::{init_tracing, LogFormat, TelemetryError};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, PROXY_AUTHORIZATION};
use std::sync::Arc;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Create the axum router with the API and the proxy fallback
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/push", get(api::list_pushes))
        .route("/push/:id", get(api::get_push))
        .route("/push/:id/authorise", post(api::authorise))
        .route("/push/:id/reject", post(api::reject))
        .route("/push/:id/cancel", post(api::cancel))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            security::require_api_key,
        ));

    Router::new()
        .nest("/api/v1", api)
        .fallback(proxy::proxy_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // outermost, so the trace layer never records credentials
        .layer(SetSensitiveRequestHeadersLayer::new([
            AUTHORIZATION,
            PROXY_AUTHORIZATION,
        ]))
}
