pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod price_tree;
pub mod routes;
pub mod schedule;

use axum::{Router, http::header};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::AppState;

/// Full application router with the HTTP layers applied.
pub fn app(state: AppState) -> Router {
    // The public site and the admin SPA are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
