//! Session HTTP routes.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::services;
use crate::state::AppState;

/// `GET /api/sessions/{id}/whiteboard`: the saved snapshot as JSON.
pub async fn saved_whiteboard(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match services::whiteboard::saved_snapshot(&state, &session_id).await {
        Some(snapshot) => {
            ([(header::CONTENT_TYPE, "application/json")], snapshot.as_str().to_owned()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "no saved whiteboard").into_response(),
    }
}

#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;
