//! Event names carried in [`Frame::syscall`](crate::Frame::syscall).
//!
//! The relay routes on the prefix before `':'`; the suffix keeps the
//! event names the browser clients already speak.

/// Sent by the relay right after the socket opens.
pub const SESSION_CONNECTED: &str = "session:connected";

// ── Whiteboard channel ──────────────────────────────────────────

pub const WHITEBOARD_UPDATE: &str = "whiteboard:update";
pub const WHITEBOARD_CLEAR: &str = "whiteboard:clear";
pub const WHITEBOARD_UNDO: &str = "whiteboard:undo";
pub const WHITEBOARD_REDO: &str = "whiteboard:redo";
pub const WHITEBOARD_SAVE: &str = "whiteboard:save";

// ── Peer-mesh signaling ─────────────────────────────────────────

pub const JOIN_ROOM: &str = "signal:join-room";
pub const LEAVE_ROOM: &str = "signal:leave-room";
pub const ALL_USERS: &str = "signal:all-users";
pub const USER_JOINED: &str = "signal:user-joined";
pub const SENDING_SIGNAL: &str = "signal:sending-signal";
pub const RETURNING_SIGNAL: &str = "signal:returning-signal";
pub const RECEIVING_RETURNED_SIGNAL: &str = "signal:receiving-returned-signal";
pub const USER_LEFT: &str = "signal:user-left";

// ── Room events ─────────────────────────────────────────────────

pub const PARTICIPANTS_UPDATE: &str = "room:participants-update";
pub const CHAT_MESSAGE: &str = "room:chat-message";
pub const RAISE_HAND: &str = "room:raise-hand";
pub const LOWER_HAND: &str = "room:lower-hand";
