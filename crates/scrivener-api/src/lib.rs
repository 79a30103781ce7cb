//! JSON HTTP surface over the Scrivener core.

pub mod auth;
pub mod content;
pub mod error;
pub mod middleware;
pub mod sessions;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;

/// All routes, without transport layers (CORS, tracing) which the server adds.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/content-types", get(auth::content_types))
        .route("/health", get(auth::health));

    let protected_routes = Router::new()
        .route("/me", get(auth::me).patch(auth::update_me))
        .route("/me/password", post(auth::change_password))
        .route("/preferences", get(auth::get_preferences).put(auth::put_preferences))
        .route("/sessions", get(sessions::list_sessions).post(sessions::create_session))
        .route(
            "/sessions/{session_id}",
            get(sessions::get_session)
                .patch(sessions::rename_session)
                .delete(sessions::delete_session),
        )
        .route("/sessions/{session_id}/messages", get(sessions::session_messages))
        .route("/sessions/{session_id}/retry", post(sessions::retry))
        .route("/generate", post(sessions::generate))
        .route("/generate/stream", post(sessions::generate_stream))
        .route("/content", get(content::list_content))
        .route("/content/{artifact_id}/favorite", post(content::toggle_favorite))
        .route("/stats", get(content::stats))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
