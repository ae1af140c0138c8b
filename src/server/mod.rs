pub mod routes;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// HTTP surface for the presentation layer: chain tables, pricing and payoff curves as JSON.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/defaults", get(routes::get_defaults))
        .route("/api/quote/{ticker}", get(routes::get_quote))
        .route("/api/expirations/{ticker}", get(routes::get_expirations))
        .route("/api/chain/{ticker}", get(routes::get_chain))
        .route("/api/analyze/{ticker}", get(routes::get_analysis))
        .route("/api/price", post(routes::post_price))
        .route("/api/payoff", post(routes::post_payoff))
        .route("/api/counters", get(routes::get_counters))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
