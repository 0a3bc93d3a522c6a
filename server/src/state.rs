//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the live rooms, keyed by session id, and the saved whiteboard of
//! every session. A room exists while at least one socket is subscribed to
//! it; saved whiteboards outlive their room.
//!
//! A room's sockets are either participants (joined through
//! `signal:join-room`, part of the peer mesh and the roster) or whiteboard
//! subscribers that only exchange whiteboard events.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use classroom::{ChatMessage, ParticipantInfo};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;
use whiteboard::Snapshot;

use crate::config::ServerConfig;
use crate::frame::Frame;

// =============================================================================
// MEMBER
// =============================================================================

/// A participant of the live classroom.
#[derive(Debug, Clone)]
pub struct Member {
    pub client_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub is_host: bool,
    pub hand_raised: bool,
}

impl Member {
    #[must_use]
    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.user_id.clone(),
            name: self.name.clone(),
            is_host: self.is_host,
            hand_raised: self.hand_raised,
        }
    }
}

// =============================================================================
// ROOM STATE
// =============================================================================

pub struct RoomState {
    /// Every subscribed socket: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
    /// Participants in join order.
    pub members: Vec<Member>,
    /// Snapshot of the last `whiteboard:update`, replayed to joiners.
    pub latest_snapshot: Option<Snapshot>,
    /// Most recent chat messages, oldest first.
    pub chat: VecDeque<ChatMessage>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self { clients: HashMap::new(), members: Vec::new(), latest_snapshot: None, chat: VecDeque::new() }
    }

    #[must_use]
    pub fn member_by_client(&self, client_id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.client_id == client_id)
    }

    pub fn member_by_client_mut(&mut self, client_id: Uuid) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.client_id == client_id)
    }

    #[must_use]
    pub fn member_by_user(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    #[must_use]
    pub fn roster(&self) -> Vec<ParticipantInfo> {
        self.members.iter().map(Member::info).collect()
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; every field is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub rooms: Arc<RwLock<HashMap<String, RoomState>>>,
    /// Saved whiteboard snapshot per session id.
    pub saved: Arc<RwLock<HashMap<String, Snapshot>>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            rooms: Arc::new(RwLock::new(HashMap::new())),
            saved: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
