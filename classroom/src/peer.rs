//! Per-peer link lifecycle.
//!
//! STATE MACHINE
//! =============
//! ```text
//! Discovered ──initiate──▶ Offering  ──returned signal──▶ Connected
//!     │                                                      ▲
//!     └────────respond───▶ Answering ──media flowing─────────┘
//!
//! any open state ──leave / failure / hangup──▶ Closed (terminal)
//! ```
//!
//! A link owns its backend connection and destroys it when it closes, either
//! explicitly or on drop. Signals and track swaps aimed at a closed link fail
//! with [`PeerError::Closed`] instead of reaching a dead backend.

#[cfg(test)]
#[path = "peer_test.rs"]
mod peer_test;

use serde_json::Value;
use tracing::debug;

use crate::error::PeerError;
use crate::media::{MediaStream, TrackHandle};

/// Opaque negotiation payload (offer, answer or candidate) relayed verbatim.
pub type Signal = Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Known participant, no connection yet.
    Discovered,
    /// Offer sent, waiting for the answer.
    Offering,
    /// Answer sent, waiting for media.
    Answering,
    Connected,
    Closed,
}

impl PeerState {
    #[must_use]
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }

    /// Whether the machine allows `self → next`.
    #[must_use]
    pub fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Offering | Self::Answering)
                | (Self::Offering | Self::Answering, Self::Connected)
                | (Self::Discovered | Self::Offering | Self::Answering | Self::Connected, Self::Closed)
        )
    }
}

/// Which side of the offer/answer exchange this participant plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Initiator,
    Responder,
}

/// Host peer connection.
pub trait PeerConnection: Send {
    /// Feed a signal that arrived from the remote side.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Backend`] when the backend rejects the signal.
    fn signal(&mut self, signal: &Signal) -> Result<(), PeerError>;

    /// Swap an outgoing track without renegotiating.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Backend`] when the backend refuses the swap.
    fn replace_track(&mut self, old: &TrackHandle, new: &TrackHandle) -> Result<(), PeerError>;

    /// Id of the stream received from the remote side, once media flows.
    fn remote_stream_id(&self) -> Option<String>;

    fn destroy(&mut self);
}

/// Creates host peer connections.
pub trait PeerFactory: Send {
    /// Create the initiating side towards `peer_id`; returns the offer to relay.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Backend`] when the connection cannot be created.
    fn initiate(&mut self, peer_id: &str, stream: &MediaStream) -> Result<(Box<dyn PeerConnection>, Signal), PeerError>;

    /// Create the answering side from `offer`; returns the answer to relay.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Backend`] when the connection cannot be created.
    fn respond(&mut self, peer_id: &str, offer: &Signal, stream: &MediaStream) -> Result<(Box<dyn PeerConnection>, Signal), PeerError>;
}

/// The link to one remote participant.
pub struct PeerLink {
    peer_id: String,
    role: PeerRole,
    state: PeerState,
    conn: Option<Box<dyn PeerConnection>>,
}

impl PeerLink {
    pub fn discovered(peer_id: impl Into<String>, role: PeerRole) -> Self {
        Self { peer_id: peer_id.into(), role, state: PeerState::Discovered, conn: None }
    }

    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    #[must_use]
    pub fn role(&self) -> PeerRole {
        self.role
    }

    #[must_use]
    pub fn state(&self) -> PeerState {
        self.state
    }

    fn advance(&mut self, next: PeerState) -> bool {
        if !self.state.can_become(next) {
            debug!(peer = %self.peer_id, from = ?self.state, to = ?next, "peer transition refused");
            return false;
        }
        self.state = next;
        true
    }

    /// Hand the backend connection to the link: Discovered → Offering or Answering.
    /// A link that is no longer Discovered destroys `conn` instead.
    pub fn attach(&mut self, mut conn: Box<dyn PeerConnection>) -> bool {
        let next = match self.role {
            PeerRole::Initiator => PeerState::Offering,
            PeerRole::Responder => PeerState::Answering,
        };
        if !self.advance(next) {
            conn.destroy();
            return false;
        }
        self.conn = Some(conn);
        true
    }

    /// Media is flowing: Offering/Answering → Connected.
    pub fn connect(&mut self) -> bool {
        self.advance(PeerState::Connected)
    }

    /// Relay a remote signal into the backend.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Closed`] for a closed link or the backend's error.
    pub fn signal(&mut self, signal: &Signal) -> Result<(), PeerError> {
        self.open_conn()?.signal(signal)
    }

    /// Swap an outgoing track on this link.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Closed`] for a closed link or the backend's error.
    pub fn replace_track(&mut self, old: &TrackHandle, new: &TrackHandle) -> Result<(), PeerError> {
        self.open_conn()?.replace_track(old, new)
    }

    #[must_use]
    pub fn remote_stream_id(&self) -> Option<String> {
        self.conn.as_ref().and_then(|c| c.remote_stream_id())
    }

    fn open_conn(&mut self) -> Result<&mut (dyn PeerConnection + 'static), PeerError> {
        if !self.state.is_open() {
            return Err(PeerError::Closed);
        }
        self.conn.as_deref_mut().ok_or(PeerError::Closed)
    }

    /// Destroy the backend connection and enter the terminal state. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.destroy();
        }
        if self.state.is_open() {
            debug!(peer = %self.peer_id, "peer link closed");
            self.state = PeerState::Closed;
        }
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        self.close();
    }
}
