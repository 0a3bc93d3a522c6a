//! Live-classroom session: a full mesh of peer media links plus the room
//! side channels (roster, chat, raised hands).
//!
//! Every participant holds one [`peer::PeerLink`] per remote participant.
//! Links are negotiated through the relay with a single offer/answer
//! exchange; the newcomer initiates towards everyone already present and
//! answers anyone who arrives later. Media capture, peer backends and the
//! relay socket are host services reached through traits
//! ([`media::MediaDevices`], [`peer::PeerFactory`],
//! [`session::SignalingLink`]), so the whole lifecycle runs in tests against
//! in-memory fakes.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | [`Classroom`]: join, inbound events, local controls, teardown |
//! | [`peer`] | Per-peer state machine and backend traits |
//! | [`media`] | Tracks, streams, capture devices and local media state |
//! | [`signal`] | Room events and their relay frames |
//! | [`participant`] | Roster, chat messages and hand signals |
//! | [`error`] | Error enums |

pub mod error;
pub mod media;
pub mod participant;
pub mod peer;
pub mod session;
pub mod signal;

pub use error::{ClassroomError, MediaError, PeerError};
pub use media::{LocalMedia, MediaDevices, MediaStream, MediaTrack, TrackHandle, TrackKind};
pub use participant::{ChatMessage, HandSignal, Participant, ParticipantInfo, Roster, StreamRef};
pub use peer::{PeerConnection, PeerFactory, PeerLink, PeerRole, PeerState, Signal};
pub use session::{ChannelLink, Classroom, LocalUser, SignalingLink};
pub use signal::RoomEvent;

#[cfg(test)]
mod fakes;
