//! HTTP surface: the catalog options endpoint and the session endpoints.

pub mod options;
pub mod sessions;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/fitment/options", get(options::get_options))
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/api/sessions/{id}/selection",
            put(sessions::set_selection).delete(sessions::clear_selection),
        )
}
