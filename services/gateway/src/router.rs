use crate::handlers::{matching, stats, sync};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/matching/runs", post(matching::trigger_run))
        .route(
            "/matches",
            get(matching::list_matches).post(matching::create_manual_match),
        )
        .route("/matches/{id}", delete(matching::delete_match))
        .route("/sync", post(sync::trigger_sync))
        .route("/sync/{id}", get(sync::get_sync_order))
        .route("/stats", get(stats::period_stats));

    Router::new()
        .nest("/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
