//! Room service: membership, fan-out, chat and raised hands.
//!
//! DESIGN
//! ======
//! A room is created by the first socket that subscribes to a session and
//! evicted when the last one leaves. Participants are addressed by user id
//! for signaling; every subscribed socket receives room broadcasts.
//!
//! Fan-out is best effort: a socket whose outbound channel is full or closed
//! misses the frame and the miss is logged. Nothing is queued or retried.

use std::collections::hash_map::Entry;
use std::time::{SystemTime, UNIX_EPOCH};

use classroom::{ChatMessage, HandSignal, ParticipantInfo};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use whiteboard::Snapshot;

use crate::frame::Frame;
use crate::state::{AppState, Member, RoomState};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("join a room first")]
    NotJoined,
    #[error("user {0} is not in this room")]
    UnknownUser(String),
    #[error("chat message is empty")]
    EmptyMessage,
    #[error("{0}")]
    Malformed(#[from] classroom::ClassroomError),
}

impl crate::frame::ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined => "E_NOT_JOINED",
            Self::UnknownUser(_) => "E_UNKNOWN_USER",
            Self::EmptyMessage => "E_EMPTY_MESSAGE",
            Self::Malformed(_) => "E_MALFORMED",
        }
    }
}

/// What a joiner needs to hear back.
#[derive(Debug, Clone)]
pub struct Joined {
    /// User ids already present, in join order.
    pub others: Vec<String>,
    pub roster: Vec<ParticipantInfo>,
    pub latest_snapshot: Option<Snapshot>,
    /// Chat kept for the room, oldest first.
    pub chat: Vec<ChatMessage>,
    /// Earlier socket of the same user, dropped in favour of this one.
    pub replaced: Option<Member>,
}

/// What the rest of the room needs to hear after a departure.
#[derive(Debug, Clone)]
pub struct Parted {
    /// Present when the socket was a participant, not only a subscriber.
    pub member: Option<Member>,
    pub roster: Vec<ParticipantInfo>,
    pub evicted: bool,
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Add a participant to the session's room, creating the room if needed.
/// A second socket for the same user replaces the first.
pub async fn join_room(
    state: &AppState,
    session_id: &str,
    client_id: Uuid,
    client_tx: mpsc::Sender<Frame>,
    user: &ParticipantInfo,
) -> Joined {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(session_id.to_owned()).or_insert_with(|| {
        info!(%session_id, "room: created");
        RoomState::new()
    });

    let replaced = room
        .members
        .iter()
        .position(|m| m.user_id == user.id && m.client_id != client_id)
        .map(|idx| room.members.remove(idx));
    if let Some(stale) = &replaced {
        room.clients.remove(&stale.client_id);
        info!(%session_id, user_id = %user.id, old_client = %stale.client_id, "room: replaced stale socket");
    }
    room.members.retain(|m| m.client_id != client_id);

    let others = room.members.iter().map(|m| m.user_id.clone()).collect();
    room.clients.insert(client_id, client_tx);
    room.members.push(Member {
        client_id,
        user_id: user.id.clone(),
        name: user.name.clone(),
        is_host: user.is_host,
        hand_raised: false,
    });
    info!(%session_id, user_id = %user.id, %client_id, members = room.members.len(), "room: joined");

    Joined {
        others,
        roster: room.roster(),
        latest_snapshot: room.latest_snapshot.clone(),
        chat: room.chat.iter().cloned().collect(),
        replaced,
    }
}

/// Subscribe a socket to the session's whiteboard traffic without joining
/// the peer mesh. Returns `false` if it was already subscribed.
pub async fn subscribe(state: &AppState, session_id: &str, client_id: Uuid, client_tx: mpsc::Sender<Frame>) -> bool {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(session_id.to_owned()).or_default();
    match room.clients.entry(client_id) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(client_tx);
            debug!(%session_id, %client_id, "room: whiteboard subscriber added");
            true
        }
    }
}

/// Remove a socket from the room. The room is evicted once no socket is left.
pub async fn part_room(state: &AppState, session_id: &str, client_id: Uuid) -> Parted {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(session_id) else {
        return Parted { member: None, roster: Vec::new(), evicted: false };
    };

    room.clients.remove(&client_id);
    let member = room
        .members
        .iter()
        .position(|m| m.client_id == client_id)
        .map(|idx| room.members.remove(idx));
    let roster = room.roster();

    let evicted = room.clients.is_empty();
    if evicted {
        rooms.remove(session_id);
        info!(%session_id, "room: evicted");
    }
    if let Some(member) = &member {
        info!(%session_id, user_id = %member.user_id, %client_id, "room: parted");
    }
    Parted { member, roster, evicted }
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Send a frame to every socket in the room except `exclude`.
pub async fn broadcast(state: &AppState, session_id: &str, frame: &Frame, exclude: Option<Uuid>) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(session_id) else {
        return;
    };
    for (client_id, tx) in &room.clients {
        if Some(*client_id) == exclude {
            continue;
        }
        if let Err(e) = tx.try_send(frame.clone()) {
            warn!(%session_id, %client_id, syscall = %frame.syscall, error = %e, "room: broadcast dropped");
        }
    }
}

/// Send a frame to one participant, addressed by user id.
///
/// # Errors
///
/// Returns [`RoomError::UnknownUser`] if no such participant is in the room.
pub async fn send_to_user(state: &AppState, session_id: &str, user_id: &str, frame: Frame) -> Result<(), RoomError> {
    let rooms = state.rooms.read().await;
    let tx = rooms
        .get(session_id)
        .and_then(|room| {
            room.member_by_user(user_id)
                .and_then(|m| room.clients.get(&m.client_id))
        })
        .ok_or_else(|| RoomError::UnknownUser(user_id.to_owned()))?;
    if let Err(e) = tx.try_send(frame) {
        warn!(%session_id, %user_id, error = %e, "room: direct send dropped");
    }
    Ok(())
}

// =============================================================================
// ROOM EVENTS
// =============================================================================

/// Record a chat line from a participant and return it stamped with the
/// sender and the server time.
///
/// # Errors
///
/// Returns [`RoomError::EmptyMessage`] for blank text and
/// [`RoomError::NotJoined`] if the socket is not a participant.
pub async fn post_chat(state: &AppState, session_id: &str, client_id: Uuid, text: &str) -> Result<ChatMessage, RoomError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RoomError::EmptyMessage);
    }
    let limit = state.config.chat_history_limit;
    let mut rooms = state.rooms.write().await;
    let room = rooms.get_mut(session_id).ok_or(RoomError::NotJoined)?;
    let member = room.member_by_client(client_id).ok_or(RoomError::NotJoined)?;

    let message = ChatMessage {
        user_id: member.user_id.clone(),
        user_name: member.name.clone(),
        text: text.to_owned(),
        ts: now_ms(),
    };
    room.chat.push_back(message.clone());
    while room.chat.len() > limit {
        room.chat.pop_front();
    }
    Ok(message)
}

/// Raise or lower a participant's hand.
///
/// # Errors
///
/// Returns [`RoomError::NotJoined`] if the socket is not a participant.
pub async fn set_hand(state: &AppState, session_id: &str, client_id: Uuid, raised: bool) -> Result<HandSignal, RoomError> {
    let mut rooms = state.rooms.write().await;
    let member = rooms
        .get_mut(session_id)
        .and_then(|room| room.member_by_client_mut(client_id))
        .ok_or(RoomError::NotJoined)?;
    member.hand_raised = raised;
    Ok(HandSignal { user_id: member.user_id.clone(), user_name: member.name.clone() })
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
