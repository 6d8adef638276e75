use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::api::handlers::{self, AppState};

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Editing sessions
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/:session_id/hydrate", post(handlers::hydrate_session))
        // Selection
        .route(
            "/sessions/:session_id/selection/:group_id",
            put(handlers::set_group_selection),
        )
        .route(
            "/sessions/:session_id/selection/:group_id/toggle",
            post(handlers::toggle_option),
        )
        // Rows and images
        .route(
            "/sessions/:session_id/rows/:client_index",
            patch(handlers::update_row),
        )
        .route(
            "/sessions/:session_id/rows/:client_index/image",
            put(handlers::upload_row_image).delete(handlers::remove_row_image),
        )
        // Submission
        .route(
            "/sessions/:session_id/submission",
            post(handlers::prepare_submission),
        )
        .route(
            "/sessions/:session_id/submission/complete",
            post(handlers::complete_submission),
        )
}
