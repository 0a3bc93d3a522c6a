//! Whiteboard bookkeeping: latest snapshot per room, saved snapshot per
//! session, and the snapshot size limit.
//!
//! The relay never merges or validates drawing content beyond parsing the
//! snapshot; whoever sent the last `update` wins.

use tracing::{debug, info};
use whiteboard::{Snapshot, WhiteboardEvent};

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum WhiteboardError {
    #[error("snapshot is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },
    #[error("{0}")]
    Invalid(#[from] whiteboard::sync::SyncError),
}

impl crate::frame::ErrorCode for WhiteboardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "E_SNAPSHOT_TOO_LARGE",
            Self::Invalid(_) => "E_BAD_WHITEBOARD_EVENT",
        }
    }
}

fn check_size(state: &AppState, snapshot: &Snapshot) -> Result<(), WhiteboardError> {
    let max = state.config.max_snapshot_bytes;
    let size = snapshot.byte_len();
    if size > max {
        return Err(WhiteboardError::TooLarge { size, max });
    }
    Ok(())
}

/// Apply an event to the relay's view of the session before it is fanned out.
///
/// # Errors
///
/// Returns [`WhiteboardError::TooLarge`] for an `update` or `save` whose
/// snapshot exceeds the configured limit. Nothing is recorded in that case.
pub async fn record(state: &AppState, event: &WhiteboardEvent) -> Result<(), WhiteboardError> {
    let session_id = event.session_id();
    match event {
        WhiteboardEvent::Update { data, .. } => {
            check_size(state, data)?;
            if let Some(room) = state.rooms.write().await.get_mut(session_id) {
                room.latest_snapshot = Some(data.clone());
            }
        }
        WhiteboardEvent::Clear { .. } => {
            if let Some(room) = state.rooms.write().await.get_mut(session_id) {
                room.latest_snapshot = None;
            }
        }
        WhiteboardEvent::Save { canvas_data, user_id, .. } => {
            check_size(state, canvas_data)?;
            state
                .saved
                .write()
                .await
                .insert(session_id.to_owned(), canvas_data.clone());
            info!(%session_id, %user_id, bytes = canvas_data.byte_len(), "whiteboard: saved");
        }
        WhiteboardEvent::Undo { .. } | WhiteboardEvent::Redo { .. } => {
            debug!(%session_id, syscall = event.syscall(), "whiteboard: notice relayed");
        }
    }
    Ok(())
}

/// The last saved snapshot of a session, if any.
pub async fn saved_snapshot(state: &AppState, session_id: &str) -> Option<Snapshot> {
    state.saved.read().await.get(session_id).cloned()
}

#[cfg(test)]
#[path = "whiteboard_test.rs"]
mod tests;
