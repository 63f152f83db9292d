//! Course authoring backend: an in-memory course document store, a client
//! for an OpenAI-compatible completion service, and the HTTP API over both.

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

pub mod config;
pub mod export;
pub mod generation;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
        )
}
