//! Room events and their relay frames.
//!
//! Payload keys match what the relay reads and writes: `sessionId`,
//! `userId`, `callerID`, `userToSignal`, `signal`, `id`. `all-users` carries a
//! bare array of ids, `user-left` a bare id, `participants-update` a bare
//! array of participants.

#[cfg(test)]
#[path = "signal_test.rs"]
mod signal_test;

use frames::{Frame, syscall};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::ClassroomError;
use crate::participant::{ChatMessage, HandSignal, ParticipantInfo};
use crate::peer::Signal;

#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Client → relay: enter the session.
    JoinRoom { session_id: String, user: ParticipantInfo },
    /// Relay → newcomer: everyone already present.
    AllUsers(Vec<String>),
    /// Client → relay: offer for `user_to_signal`.
    SendingSignal { user_to_signal: String, caller_id: String, signal: Signal },
    /// Relay → existing participant: a newcomer's offer.
    UserJoined { signal: Signal, caller_id: String },
    /// Client → relay: answer for the original caller.
    ReturningSignal { signal: Signal, caller_id: String },
    /// Relay → caller: the answer from `id`.
    ReceivingReturnedSignal { id: String, signal: Signal },
    UserLeft(String),
    /// Client → relay: leave the session without closing the socket.
    LeaveRoom { session_id: String },
    ParticipantsUpdate(Vec<ParticipantInfo>),
    ChatMessage(ChatMessage),
    RaiseHand(HandSignal),
    LowerHand(HandSignal),
}

impl RoomEvent {
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => syscall::JOIN_ROOM,
            Self::AllUsers(_) => syscall::ALL_USERS,
            Self::SendingSignal { .. } => syscall::SENDING_SIGNAL,
            Self::UserJoined { .. } => syscall::USER_JOINED,
            Self::ReturningSignal { .. } => syscall::RETURNING_SIGNAL,
            Self::ReceivingReturnedSignal { .. } => syscall::RECEIVING_RETURNED_SIGNAL,
            Self::UserLeft(_) => syscall::USER_LEFT,
            Self::LeaveRoom { .. } => syscall::LEAVE_ROOM,
            Self::ParticipantsUpdate(_) => syscall::PARTICIPANTS_UPDATE,
            Self::ChatMessage(_) => syscall::CHAT_MESSAGE,
            Self::RaiseHand(_) => syscall::RAISE_HAND,
            Self::LowerHand(_) => syscall::LOWER_HAND,
        }
    }

    /// Request frame for `session_id`.
    #[must_use]
    pub fn to_frame(&self, session_id: &str) -> Frame {
        let data = match self {
            Self::JoinRoom { session_id, user } => json!({
                "sessionId": session_id,
                "userId": user.id,
                "userName": user.name,
                "isHost": user.is_host,
            }),
            Self::AllUsers(ids) => json!(ids),
            Self::SendingSignal { user_to_signal, caller_id, signal } => json!({
                "userToSignal": user_to_signal,
                "callerID": caller_id,
                "signal": signal,
            }),
            Self::UserJoined { signal, caller_id } | Self::ReturningSignal { signal, caller_id } => {
                json!({ "signal": signal, "callerID": caller_id })
            }
            Self::ReceivingReturnedSignal { id, signal } => json!({ "id": id, "signal": signal }),
            Self::UserLeft(id) => json!(id),
            Self::LeaveRoom { session_id } => json!({ "sessionId": session_id }),
            Self::ParticipantsUpdate(list) => json!(list),
            Self::ChatMessage(msg) => json!(msg),
            Self::RaiseHand(hand) | Self::LowerHand(hand) => json!(hand),
        };
        Frame::request(self.syscall(), data).with_session(session_id)
    }

    /// Parse a frame from the relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::Malformed`] for unknown event names or
    /// payloads of the wrong shape.
    pub fn from_frame(frame: &Frame) -> Result<Self, ClassroomError> {
        let name = frame.syscall.as_str();
        let data = &frame.data;
        let event = match name {
            syscall::JOIN_ROOM => Self::JoinRoom {
                session_id: text(name, data, "sessionId")?,
                user: ParticipantInfo {
                    id: text(name, data, "userId")?,
                    name: data.get("userName").and_then(Value::as_str).unwrap_or_default().to_owned(),
                    is_host: data.get("isHost").and_then(Value::as_bool).unwrap_or(false),
                    hand_raised: false,
                },
            },
            syscall::ALL_USERS => Self::AllUsers(parse(name, data)?),
            syscall::SENDING_SIGNAL => Self::SendingSignal {
                user_to_signal: text(name, data, "userToSignal")?,
                caller_id: text(name, data, "callerID")?,
                signal: signal(name, data)?,
            },
            syscall::USER_JOINED => Self::UserJoined { signal: signal(name, data)?, caller_id: text(name, data, "callerID")? },
            syscall::RETURNING_SIGNAL => Self::ReturningSignal { signal: signal(name, data)?, caller_id: text(name, data, "callerID")? },
            syscall::RECEIVING_RETURNED_SIGNAL => Self::ReceivingReturnedSignal { id: text(name, data, "id")?, signal: signal(name, data)? },
            syscall::USER_LEFT => Self::UserLeft(parse(name, data)?),
            syscall::LEAVE_ROOM => Self::LeaveRoom { session_id: text(name, data, "sessionId")? },
            syscall::PARTICIPANTS_UPDATE => Self::ParticipantsUpdate(parse(name, data)?),
            syscall::CHAT_MESSAGE => Self::ChatMessage(parse(name, data)?),
            syscall::RAISE_HAND => Self::RaiseHand(parse(name, data)?),
            syscall::LOWER_HAND => Self::LowerHand(parse(name, data)?),
            other => return Err(malformed(other, "unknown event")),
        };
        Ok(event)
    }
}

fn malformed(event: &str, reason: impl Into<String>) -> ClassroomError {
    ClassroomError::Malformed { event: event.to_owned(), reason: reason.into() }
}

fn text(event: &str, data: &Value, key: &str) -> Result<String, ClassroomError> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| malformed(event, format!("missing {key}")))
}

fn signal(event: &str, data: &Value) -> Result<Signal, ClassroomError> {
    match data.get("signal") {
        Some(Value::Null) | None => Err(malformed(event, "missing signal")),
        Some(value) => Ok(value.clone()),
    }
}

fn parse<T: DeserializeOwned>(event: &str, data: &Value) -> Result<T, ClassroomError> {
    serde_json::from_value(data.clone()).map_err(|e| malformed(event, e.to_string()))
}
