//! Errors for the classroom crate.
//!
//! Media and peer backends report their own enums; [`ClassroomError`] is what
//! session operations return. Permission denial gets its own variant because
//! the host shows it as a blocking alert.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("media permission denied")]
    PermissionDenied,
    #[error("no capture device available: {0}")]
    Unavailable(String),
    /// The user dismissed the picker or the capture was interrupted.
    #[error("media capture aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("peer backend failed: {0}")]
    Backend(String),
    #[error("peer link is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassroomError {
    #[error("camera and microphone access was denied")]
    MediaPermissionDenied,
    #[error(transparent)]
    Media(MediaError),
    #[error("already joined the session")]
    AlreadyJoined,
    #[error("not joined to the session")]
    NotJoined,
    #[error("the session has been left")]
    SessionClosed,
    #[error("chat message is empty")]
    EmptyMessage,
    #[error("signaling link failed: {0}")]
    Signaling(String),
    #[error("malformed {event} event: {reason}")]
    Malformed { event: String, reason: String },
}

impl From<MediaError> for ClassroomError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied => Self::MediaPermissionDenied,
            other => Self::Media(other),
        }
    }
}
