// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, comments, enrichment, moderation, translate, videos},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Login is public; every other route requires a bearer token.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let moderation_routes = Router::new()
        .route("/comments/{type}", get(comments::list_comments))
        .route("/comments/{type}/{id}", delete(comments::delete_comment))
        .route("/comments/{type}/bulk-delete", post(comments::bulk_delete))
        .route("/approve/{id}", post(moderation::approve))
        .route("/reject/{id}", post(moderation::reject))
        .route("/undo/{id}", post(moderation::undo))
        .route("/bulk/approve", post(moderation::bulk_approve))
        .route("/bulk/reject", post(moderation::bulk_reject))
        .route("/bulk/undo", post(moderation::bulk_undo));

    let api_routes = Router::new()
        .route("/videos", get(videos::list_videos))
        .route("/comments/{video_id}/details", get(comments::get_details))
        .route("/comments/analyze", post(enrichment::analyze))
        .route("/comments/analyze/latest", get(enrichment::latest_run))
        .route("/comments/analyze/runs/{id}", get(enrichment::get_run))
        .route("/translate", post(translate::translate));

    let protected = moderation_routes
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
