//! Whiteboard channel: event mapping and the last-writer-wins policy.
//!
//! DESIGN
//! ======
//! Collaborators exchange whole snapshots. A local [`Change`] becomes one or
//! two outbound [`WhiteboardEvent`]s; an inbound `update` replaces the local
//! surface outright, whoever sent it last wins. History stays local: undo and
//! redo travel as an `update` carrying the snapshot now shown, followed by a
//! notice that receivers accept and otherwise ignore.
//!
//! The relay fans every event out to the whole session, sender included, and
//! stamps `from` on what it forwards. Events originating from the local user
//! are dropped here so a tab never re-applies its own changes.
//!
//! Concurrent edits can clobber each other. There are no versions, vector
//! clocks or merges.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use frames::{Frame, syscall};
use serde_json::json;
use tracing::debug;

use crate::engine::{Change, EngineCore};
use crate::error::SurfaceError;
use crate::snapshot::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("not a whiteboard event: {0}")]
    UnknownEvent(String),
    #[error("{event} is missing {field}")]
    MissingField { event: &'static str, field: &'static str },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// One message on the whiteboard channel.
#[derive(Debug, Clone, PartialEq)]
pub enum WhiteboardEvent {
    Update { session_id: String, data: Snapshot, user_id: String },
    Clear { session_id: String },
    Undo { session_id: String },
    Redo { session_id: String },
    /// Persist the snapshot as the session's saved board.
    Save { session_id: String, canvas_data: Snapshot, user_id: String },
}

impl WhiteboardEvent {
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Update { session_id, .. }
            | Self::Clear { session_id }
            | Self::Undo { session_id }
            | Self::Redo { session_id }
            | Self::Save { session_id, .. } => session_id,
        }
    }

    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::Update { .. } => syscall::WHITEBOARD_UPDATE,
            Self::Clear { .. } => syscall::WHITEBOARD_CLEAR,
            Self::Undo { .. } => syscall::WHITEBOARD_UNDO,
            Self::Redo { .. } => syscall::WHITEBOARD_REDO,
            Self::Save { .. } => syscall::WHITEBOARD_SAVE,
        }
    }

    /// Request frame for the relay.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let data = match self {
            Self::Update { session_id, data, user_id } => {
                json!({ "sessionId": session_id, "data": data.as_str(), "userId": user_id })
            }
            Self::Clear { session_id } | Self::Undo { session_id } | Self::Redo { session_id } => {
                json!({ "sessionId": session_id })
            }
            Self::Save { session_id, canvas_data, user_id } => {
                json!({ "sessionId": session_id, "canvasData": canvas_data.as_str(), "userId": user_id })
            }
        };
        Frame::request(self.syscall(), data).with_session(self.session_id())
    }

    /// Parse a frame received from the relay.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] for non-whiteboard frames, missing fields, or a
    /// snapshot that does not parse.
    pub fn from_frame(frame: &Frame) -> Result<Self, SyncError> {
        let event: &'static str = match frame.syscall.as_str() {
            syscall::WHITEBOARD_UPDATE => syscall::WHITEBOARD_UPDATE,
            syscall::WHITEBOARD_CLEAR => syscall::WHITEBOARD_CLEAR,
            syscall::WHITEBOARD_UNDO => syscall::WHITEBOARD_UNDO,
            syscall::WHITEBOARD_REDO => syscall::WHITEBOARD_REDO,
            syscall::WHITEBOARD_SAVE => syscall::WHITEBOARD_SAVE,
            other => return Err(SyncError::UnknownEvent(other.to_owned())),
        };
        let session_id = frame
            .str_field("sessionId")
            .or(frame.session_id.as_deref())
            .ok_or(SyncError::MissingField { event, field: "sessionId" })?
            .to_owned();
        let field = |name: &'static str| frame.str_field(name).ok_or(SyncError::MissingField { event, field: name });

        Ok(match event {
            syscall::WHITEBOARD_UPDATE => Self::Update {
                session_id,
                data: Snapshot::from_json(field("data")?)?,
                user_id: field("userId")?.to_owned(),
            },
            syscall::WHITEBOARD_CLEAR => Self::Clear { session_id },
            syscall::WHITEBOARD_UNDO => Self::Undo { session_id },
            syscall::WHITEBOARD_REDO => Self::Redo { session_id },
            _ => Self::Save {
                session_id,
                canvas_data: Snapshot::from_json(field("canvasData")?)?,
                user_id: field("userId")?.to_owned(),
            },
        })
    }
}

/// Why an inbound event left the surface untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Sent by the local user.
    Echo,
    /// Addressed to another session.
    OtherSession,
    /// Undo/redo notice or a save; the accompanying update carries the state.
    Notice,
}

/// Result of applying an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The surface was replaced by a collaborator's snapshot.
    Applied,
    /// The surface was cleared and local history reset.
    Cleared,
    Ignored(IgnoreReason),
}

/// Binds the local surface to one session as one user.
#[derive(Debug, Clone)]
pub struct WhiteboardSync {
    session_id: String,
    user_id: String,
}

impl WhiteboardSync {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), user_id: user_id.into() }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Events to broadcast for a local change, in send order.
    #[must_use]
    pub fn outbound(&self, change: &Change) -> Vec<WhiteboardEvent> {
        let session_id = self.session_id.clone();
        match change {
            Change::Snapshot(snapshot) => vec![self.update(snapshot)],
            Change::Cleared => vec![WhiteboardEvent::Clear { session_id }],
            Change::Undone(snapshot) => vec![self.update(snapshot), WhiteboardEvent::Undo { session_id }],
            Change::Redone(snapshot) => vec![self.update(snapshot), WhiteboardEvent::Redo { session_id }],
        }
    }

    /// Outbound events already encoded as relay frames.
    #[must_use]
    pub fn outbound_frames(&self, change: &Change) -> Vec<Frame> {
        self.outbound(change).iter().map(WhiteboardEvent::to_frame).collect()
    }

    fn update(&self, snapshot: &Snapshot) -> WhiteboardEvent {
        WhiteboardEvent::Update { session_id: self.session_id.clone(), data: snapshot.clone(), user_id: self.user_id.clone() }
    }

    /// Apply an inbound event. `from` is the relay-stamped sender, if known.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if an update's snapshot cannot be loaded.
    pub fn apply_remote(&self, core: &mut EngineCore, event: &WhiteboardEvent, from: Option<&str>) -> Result<RemoteOutcome, SurfaceError> {
        if event.session_id() != self.session_id {
            debug!(session_id = event.session_id(), "whiteboard event for another session");
            return Ok(RemoteOutcome::Ignored(IgnoreReason::OtherSession));
        }
        let author = match event {
            WhiteboardEvent::Update { user_id, .. } | WhiteboardEvent::Save { user_id, .. } => Some(user_id.as_str()),
            _ => from,
        };
        if author == Some(self.user_id.as_str()) || from == Some(self.user_id.as_str()) {
            return Ok(RemoteOutcome::Ignored(IgnoreReason::Echo));
        }

        match event {
            WhiteboardEvent::Update { data, .. } => {
                core.load_snapshot(data)?;
                Ok(RemoteOutcome::Applied)
            }
            WhiteboardEvent::Clear { .. } => {
                core.reset_from_remote_clear();
                Ok(RemoteOutcome::Cleared)
            }
            WhiteboardEvent::Undo { .. } | WhiteboardEvent::Redo { .. } | WhiteboardEvent::Save { .. } => {
                Ok(RemoteOutcome::Ignored(IgnoreReason::Notice))
            }
        }
    }

    /// Parse and apply a relay frame.
    ///
    /// # Errors
    ///
    /// See [`WhiteboardEvent::from_frame`] and [`Self::apply_remote`].
    pub fn apply_frame(&self, core: &mut EngineCore, frame: &Frame) -> Result<RemoteOutcome, SyncError> {
        let event = WhiteboardEvent::from_frame(frame)?;
        Ok(self.apply_remote(core, &event, frame.from.as_deref())?)
    }

    /// The `save` event for the surface as it is now.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the surface cannot be captured.
    pub fn save(&self, core: &EngineCore) -> Result<WhiteboardEvent, SurfaceError> {
        Ok(WhiteboardEvent::Save {
            session_id: self.session_id.clone(),
            canvas_data: core.snapshot()?,
            user_id: self.user_id.clone(),
        })
    }
}
