//! hookline-daemon - HTTP front end of a hookline host
//!
//! Every request is one provider-set envelope posted to `/rpc`; the answer is
//! the paired response envelope. Host errors come back as a non-2xx status
//! with a `{error, message}` body.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use hookline_daemon::create_router;
//! use hookline_host::{HostConfig, ProviderManager};
//!
//! let manager = Arc::new(ProviderManager::from_config(&HostConfig::demo()));
//! let router = create_router(manager);
//! ```

pub mod error;

pub use error::ApiError;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use hookline_host::{ProviderManager, RpcService};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the daemon router around a provider manager
pub fn create_router(manager: Arc<ProviderManager>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/rpc", post(rpc))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(manager)
}

async fn rpc(State(manager): State<Arc<ProviderManager>>, Json(envelope): Json<Value>) -> Result<Json<Value>, ApiError> {
    let response = manager.rpc_call(envelope).await?;
    Ok(Json(response))
}
