// Library crate for Spell Binder
// Exports modules for use by the worker, the sync-watch client and tests

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middlewares;
pub mod models;
pub mod queue;
pub mod repositories;
pub mod services;
pub mod state;
pub mod telemetry;

use axum::{
    extract::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    card_prices, create_entry, delete_entry, get_card, get_entry, get_sync_job,
    image_sync_progress, import_cards, list_entries, list_sync_status, login, me, register,
    search_cards, start_image_sync, update_entry,
};
use crate::middlewares::auth_middleware;
use crate::state::AppState;

/// Build the application router with the given state
pub fn build_router(state: AppState) -> Router {
    // Protected routes (require authentication)
    let protected_routes = Router::new()
        .route("/api/auth/me", get(me))
        // Card catalog
        .route("/api/cards", get(search_cards))
        .route("/api/cards/import", post(import_cards))
        .route("/api/cards/{id}", get(get_card))
        .route("/api/cards/{id}/prices", get(card_prices))
        // Collection entries of the current user
        .route("/api/collection", get(list_entries).post(create_entry))
        .route(
            "/api/collection/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
        // Sync
        .route("/api/sync/images", post(start_image_sync))
        .route("/api/sync/images/progress", get(image_sync_progress))
        .route("/api/sync/status", get(list_sync_status))
        .route("/api/sync/jobs/{job_id}", get(get_sync_job))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(|| async { "Spell Binder is running" }))
        // Public auth routes
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    // user_id is filled in by the auth middleware
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        user_id = tracing::field::Empty,
                    )
                }))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
