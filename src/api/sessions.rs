//! Session endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::AppState;
use crate::error::SessionError;
use crate::selection::FieldUpdate;
use crate::session::{SessionHandle, SessionView};

type ApiResult<T> = Result<T, (StatusCode, String)>;

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    /// Hold the response until no category is loading.
    #[serde(default)]
    pub wait: bool,
}

fn find(state: &AppState, id: &str) -> ApiResult<SessionHandle> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Session '{id}' not found")))
}

fn map_session_error(err: SessionError) -> (StatusCode, String) {
    match err {
        SessionError::Selection(e) => (StatusCode::CONFLICT, e.to_string()),
        SessionError::Closed => (StatusCode::GONE, err.to_string()),
    }
}

/// POST /api/sessions - Start a session.
pub async fn create_session(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    let session = state.sessions.create();
    let view = render(&session, params.wait).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/sessions/{id} - Current session view.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ViewParams>,
) -> ApiResult<Json<SessionView>> {
    let session = find(&state, &id)?;
    Ok(Json(render(&session, params.wait).await?))
}

/// PUT /api/sessions/{id}/selection - Set one stage.
pub async fn set_selection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ViewParams>,
    Json(update): Json<FieldUpdate>,
) -> ApiResult<Json<SessionView>> {
    let session = find(&state, &id)?;
    tracing::info!(session_id = %id, stage = %update.stage(), "Selection update");

    let view = session.set_field(update).await.map_err(map_session_error)?;
    if params.wait {
        return Ok(Json(render(&session, true).await?));
    }
    Ok(Json(view))
}

/// DELETE /api/sessions/{id}/selection - Clear every stage.
pub async fn clear_selection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let session = find(&state, &id)?;
    let view = session.clear_all().await.map_err(map_session_error)?;
    Ok(Json(view))
}

/// DELETE /api/sessions/{id} - Drop a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.sessions.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Session '{id}' not found")))
    }
}

async fn render(session: &SessionHandle, wait: bool) -> ApiResult<SessionView> {
    let view = if wait {
        session.view_when_idle().await
    } else {
        session.view().await
    };
    view.map_err(map_session_error)
}
