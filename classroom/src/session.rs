//! The live-classroom session.
//!
//! DESIGN
//! ======
//! `Classroom` owns local media, one `PeerLink` per remote participant, the
//! roster and chat log, and the signaling link to the relay. Every inbound
//! relay frame goes through [`Classroom::handle_event`]; backend callbacks
//! (media flowing, backend failure) arrive through [`Classroom::peer_connected`]
//! and [`Classroom::peer_failed`].
//!
//! Mesh: on join the relay answers with `all-users`, and the newcomer
//! initiates a link to each of them. Participants already present answer the
//! newcomer's offer when it arrives as `user-joined`. At most one open link
//! exists per remote participant.
//!
//! ERROR HANDLING
//! ==============
//! A failing backend call closes only the link it belongs to and is logged;
//! other links carry on. Returned signals for unknown or closed links are
//! dropped. Nothing is retried. After `leave()` every inbound frame is ignored.
//!
//! TEARDOWN
//! ========
//! `leave()` stops local tracks, then destroys every peer connection, then
//! disconnects signaling. It runs on drop if the host never called it.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::HashMap;

use frames::Frame;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ClassroomError, PeerError};
use crate::media::{LocalMedia, MediaDevices, TrackHandle};
use crate::participant::{ChatMessage, HandSignal, ParticipantInfo, Roster, StreamRef};
use crate::peer::{PeerFactory, PeerLink, PeerRole, PeerState, Signal};
use crate::signal::RoomEvent;

/// Outbound half of the relay connection.
pub trait SignalingLink: Send {
    /// Queue a frame for the relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::Signaling`] when the link is gone or full.
    fn send(&mut self, frame: Frame) -> Result<(), ClassroomError>;

    /// Close the connection. Later sends fail.
    fn disconnect(&mut self);
}

/// [`SignalingLink`] over a bounded channel drained by the host's socket task.
#[derive(Debug)]
pub struct ChannelLink {
    tx: Option<mpsc::Sender<Frame>>,
}

impl ChannelLink {
    #[must_use]
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx: Some(tx) }
    }
}

impl SignalingLink for ChannelLink {
    fn send(&mut self, frame: Frame) -> Result<(), ClassroomError> {
        let tx = self.tx.as_ref().ok_or_else(|| ClassroomError::Signaling("disconnected".into()))?;
        tx.try_send(frame).map_err(|e| ClassroomError::Signaling(e.to_string()))
    }

    fn disconnect(&mut self) {
        self.tx = None;
    }
}

/// Who this tab is, as supplied by the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub id: String,
    pub name: String,
    pub is_host: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Joined,
    Left,
}

pub struct Classroom {
    session_id: String,
    user: LocalUser,
    phase: Phase,
    link: Option<Box<dyn SignalingLink>>,
    factory: Box<dyn PeerFactory>,
    media: Option<LocalMedia>,
    peers: HashMap<String, PeerLink>,
    roster: Roster,
    chat: Vec<ChatMessage>,
}

impl Classroom {
    pub fn new(session_id: impl Into<String>, user: LocalUser, link: Box<dyn SignalingLink>, factory: Box<dyn PeerFactory>) -> Self {
        let roster = Roster::new(&ParticipantInfo {
            id: user.id.clone(),
            name: user.name.clone(),
            is_host: user.is_host,
            hand_raised: false,
        });
        Self {
            session_id: session_id.into(),
            user,
            phase: Phase::Idle,
            link: Some(link),
            factory,
            media: None,
            peers: HashMap::new(),
            roster,
            chat: Vec::new(),
        }
    }

    // =========================================================================
    // JOIN
    // =========================================================================

    /// Acquire camera and microphone, then announce ourselves to the room.
    /// Nothing is sent if capture fails.
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::MediaPermissionDenied`] when the user refuses
    /// capture, [`ClassroomError::Media`] for other capture failures, and
    /// [`ClassroomError::Signaling`] if the announcement cannot be queued.
    pub async fn join(&mut self, devices: &dyn MediaDevices) -> Result<(), ClassroomError> {
        match self.phase {
            Phase::Idle => {}
            Phase::Joined => return Err(ClassroomError::AlreadyJoined),
            Phase::Left => return Err(ClassroomError::SessionClosed),
        }

        let stream = devices.user_media().await.map_err(|e| {
            warn!(session_id = %self.session_id, error = %e, "camera/microphone capture failed");
            ClassroomError::from(e)
        })?;
        self.media = Some(LocalMedia::new(stream));
        self.phase = Phase::Joined;

        let user = self.local_info();
        self.send(RoomEvent::JoinRoom { session_id: self.session_id.clone(), user })?;
        info!(session_id = %self.session_id, user_id = %self.user.id, "joined classroom");
        Ok(())
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Apply one frame from the relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::Malformed`] for frames that do not parse and
    /// [`ClassroomError::Signaling`] if a reply cannot be queued. Per-peer
    /// backend failures are not errors; they close that peer's link.
    pub fn handle_event(&mut self, frame: &Frame) -> Result<(), ClassroomError> {
        if self.phase != Phase::Joined {
            debug!(syscall = %frame.syscall, "frame ignored outside a joined session");
            return Ok(());
        }

        match RoomEvent::from_frame(frame)? {
            RoomEvent::AllUsers(ids) => {
                for id in ids {
                    self.call(&id)?;
                }
                Ok(())
            }
            RoomEvent::UserJoined { signal, caller_id } => self.answer(&caller_id, &signal),
            RoomEvent::ReceivingReturnedSignal { id, signal } => {
                self.accept_answer(&id, &signal);
                Ok(())
            }
            RoomEvent::UserLeft(id) => {
                self.drop_peer(&id);
                Ok(())
            }
            RoomEvent::ParticipantsUpdate(list) => {
                self.roster.apply_update(&list);
                Ok(())
            }
            RoomEvent::ChatMessage(msg) => {
                self.chat.push(msg);
                Ok(())
            }
            RoomEvent::RaiseHand(hand) => {
                self.roster.set_hand(&hand.user_id, true);
                Ok(())
            }
            RoomEvent::LowerHand(hand) => {
                self.roster.set_hand(&hand.user_id, false);
                Ok(())
            }
            event @ (RoomEvent::JoinRoom { .. }
            | RoomEvent::SendingSignal { .. }
            | RoomEvent::ReturningSignal { .. }
            | RoomEvent::LeaveRoom { .. }) => {
                debug!(syscall = event.syscall(), "relay-bound event received by client; ignored");
                Ok(())
            }
        }
    }

    /// Initiate a link to a participant who was already in the room.
    fn call(&mut self, peer_id: &str) -> Result<(), ClassroomError> {
        if peer_id == self.user.id || self.has_open_link(peer_id) {
            return Ok(());
        }
        let Some(media) = self.media.as_ref() else {
            return Err(ClassroomError::NotJoined);
        };
        self.roster.add(peer_id);

        let mut link = PeerLink::discovered(peer_id, PeerRole::Initiator);
        let offer = match self.factory.initiate(peer_id, media.camera()) {
            Ok((conn, offer)) => {
                link.attach(conn);
                offer
            }
            Err(e) => {
                warn!(peer = peer_id, error = %e, "could not create peer connection");
                link.close();
                self.peers.insert(peer_id.to_owned(), link);
                return Ok(());
            }
        };
        swap_to_screen(&mut link, media);
        self.peers.insert(peer_id.to_owned(), link);

        self.send(RoomEvent::SendingSignal {
            user_to_signal: peer_id.to_owned(),
            caller_id: self.user.id.clone(),
            signal: offer,
        })
    }

    /// Answer a newcomer's offer, or feed it to the live link we already have.
    fn answer(&mut self, caller_id: &str, offer: &Signal) -> Result<(), ClassroomError> {
        if caller_id == self.user.id {
            return Ok(());
        }
        if let Some(link) = self.peers.get_mut(caller_id).filter(|l| l.state().is_open()) {
            debug!(peer = caller_id, "repeated offer fed to existing link");
            if let Err(e) = link.signal(offer) {
                self.fail(caller_id, &e);
            }
            return Ok(());
        }
        let Some(media) = self.media.as_ref() else {
            return Err(ClassroomError::NotJoined);
        };
        self.roster.add(caller_id);

        let mut link = PeerLink::discovered(caller_id, PeerRole::Responder);
        let reply = match self.factory.respond(caller_id, offer, media.camera()) {
            Ok((conn, reply)) => {
                link.attach(conn);
                reply
            }
            Err(e) => {
                warn!(peer = caller_id, error = %e, "could not answer peer offer");
                link.close();
                self.peers.insert(caller_id.to_owned(), link);
                return Ok(());
            }
        };
        swap_to_screen(&mut link, media);
        self.peers.insert(caller_id.to_owned(), link);

        self.send(RoomEvent::ReturningSignal { signal: reply, caller_id: caller_id.to_owned() })
    }

    /// Deliver the answer to a link we initiated. Stale answers are dropped.
    fn accept_answer(&mut self, peer_id: &str, signal: &Signal) {
        let Some(link) = self.peers.get_mut(peer_id).filter(|l| l.state().is_open()) else {
            debug!(peer = peer_id, "returned signal for unknown or closed link dropped");
            return;
        };
        if let Err(e) = link.signal(signal) {
            self.fail(peer_id, &e);
            return;
        }
        if link.state() == PeerState::Offering && link.connect() {
            let stream = link.remote_stream_id();
            self.mark_streaming(peer_id, stream);
        }
    }

    /// The peer backend reports media flowing on the link to `peer_id`.
    pub fn peer_connected(&mut self, peer_id: &str) -> bool {
        let Some(link) = self.peers.get_mut(peer_id) else {
            debug!(peer = peer_id, "connect report for unknown link");
            return false;
        };
        match link.state() {
            PeerState::Connected => true,
            PeerState::Offering | PeerState::Answering if link.connect() => {
                let stream = link.remote_stream_id();
                self.mark_streaming(peer_id, stream);
                true
            }
            _ => false,
        }
    }

    /// The peer backend failed on the link to `peer_id`. Only that link closes.
    pub fn peer_failed(&mut self, peer_id: &str, error: &PeerError) {
        self.fail(peer_id, error);
    }

    fn fail(&mut self, peer_id: &str, error: &PeerError) {
        if let Some(link) = self.peers.get_mut(peer_id) {
            warn!(peer = peer_id, error = %error, "peer link failed; closing it");
            link.close();
        }
        self.roster.set_stream(peer_id, StreamRef::Pending);
    }

    fn mark_streaming(&mut self, peer_id: &str, stream: Option<String>) {
        let stream = stream.unwrap_or_else(|| peer_id.to_owned());
        self.roster.set_stream(peer_id, StreamRef::Remote(stream));
        info!(peer = peer_id, "peer connected");
    }

    fn drop_peer(&mut self, peer_id: &str) {
        if let Some(mut link) = self.peers.remove(peer_id) {
            link.close();
        }
        self.roster.remove(peer_id);
        info!(peer = peer_id, "participant left");
    }

    fn has_open_link(&self, peer_id: &str) -> bool {
        self.peers.get(peer_id).is_some_and(|l| l.state().is_open())
    }

    // =========================================================================
    // LOCAL CONTROLS
    // =========================================================================

    /// Flip the microphone. Returns whether it is now muted.
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::NotJoined`] before media is captured.
    pub fn toggle_mute(&mut self) -> Result<bool, ClassroomError> {
        Ok(self.media_mut()?.toggle_mute())
    }

    /// Flip the camera. Returns whether it is now off.
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::NotJoined`] before media is captured.
    pub fn toggle_camera(&mut self) -> Result<bool, ClassroomError> {
        Ok(self.media_mut()?.toggle_camera())
    }

    /// Start or stop screen sharing. Returns whether sharing is now on. A
    /// failed or cancelled capture leaves everything as it was.
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::NotJoined`] before media is captured.
    pub async fn toggle_screen_share(&mut self, devices: &dyn MediaDevices) -> Result<bool, ClassroomError> {
        if self.media_mut()?.is_screen_sharing() {
            self.stop_screen_share()?;
            return Ok(false);
        }

        let screen = match devices.display_media().await {
            Ok(screen) => screen,
            Err(e) => {
                warn!(error = %e, "screen capture failed; keeping camera");
                return Ok(false);
            }
        };
        let Some(new) = screen.video_track().cloned() else {
            warn!("screen capture returned no video track; keeping camera");
            screen.stop();
            return Ok(false);
        };
        let media = self.media_mut()?;
        let old = media.camera().video_track().cloned();
        media.begin_screen_share(screen);
        if let Some(old) = old {
            self.replace_outgoing(&old, &new);
        }
        info!("screen share started");
        Ok(true)
    }

    /// Stop sharing and restore the camera track on every link. Also called
    /// when the host reports that the shared screen ended.
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::NotJoined`] before media is captured.
    pub fn stop_screen_share(&mut self) -> Result<bool, ClassroomError> {
        let media = self.media_mut()?;
        let camera = media.camera().video_track().cloned();
        let Some(screen) = media.end_screen_share() else {
            return Ok(false);
        };
        if let (Some(old), Some(new)) = (screen.video_track(), camera) {
            self.replace_outgoing(old, &new);
        }
        info!("screen share stopped");
        Ok(true)
    }

    fn replace_outgoing(&mut self, old: &TrackHandle, new: &TrackHandle) {
        let mut failed = Vec::new();
        for (peer_id, link) in &mut self.peers {
            if !link.state().is_open() {
                continue;
            }
            if let Err(e) = link.replace_track(old, new) {
                failed.push((peer_id.clone(), e));
            }
        }
        for (peer_id, e) in failed {
            self.fail(&peer_id, &e);
        }
    }

    /// Send a chat line. The relay echoes it back to everyone, us included,
    /// and the echo is what lands in [`Self::chat`].
    ///
    /// # Errors
    ///
    /// Returns [`ClassroomError::EmptyMessage`] for blank text and
    /// [`ClassroomError::NotJoined`] outside a joined session.
    pub fn send_chat(&mut self, text: &str) -> Result<(), ClassroomError> {
        self.require_joined()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ClassroomError::EmptyMessage);
        }
        self.send(RoomEvent::ChatMessage(ChatMessage {
            user_id: self.user.id.clone(),
            user_name: self.user.name.clone(),
            text: text.to_owned(),
            ts: 0,
        }))
    }

    /// # Errors
    ///
    /// Returns [`ClassroomError::NotJoined`] outside a joined session.
    pub fn raise_hand(&mut self) -> Result<(), ClassroomError> {
        self.set_hand(true)
    }

    /// # Errors
    ///
    /// Returns [`ClassroomError::NotJoined`] outside a joined session.
    pub fn lower_hand(&mut self) -> Result<(), ClassroomError> {
        self.set_hand(false)
    }

    fn set_hand(&mut self, raised: bool) -> Result<(), ClassroomError> {
        self.require_joined()?;
        let hand = HandSignal { user_id: self.user.id.clone(), user_name: self.user.name.clone() };
        self.roster.set_hand(&self.user.id, raised);
        self.send(if raised { RoomEvent::RaiseHand(hand) } else { RoomEvent::LowerHand(hand) })
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Stop local tracks, destroy every peer connection, disconnect
    /// signaling. Idempotent.
    pub fn leave(&mut self) {
        if self.phase == Phase::Left {
            return;
        }
        let was_joined = self.phase == Phase::Joined;
        self.phase = Phase::Left;

        if let Some(mut media) = self.media.take() {
            media.stop_all();
        }
        for (_, mut link) in self.peers.drain() {
            link.close();
        }
        if let Some(mut link) = self.link.take() {
            if was_joined {
                if let Err(e) = link.send(RoomEvent::LeaveRoom { session_id: self.session_id.clone() }.to_frame(&self.session_id)) {
                    debug!(error = %e, "leave notice not sent");
                }
            }
            link.disconnect();
        }
        info!(session_id = %self.session_id, "left classroom");
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn user(&self) -> &LocalUser {
        &self.user
    }

    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.phase == Phase::Joined
    }

    #[must_use]
    pub fn peer_state(&self, peer_id: &str) -> Option<PeerState> {
        self.peers.get(peer_id).map(PeerLink::state)
    }

    /// Number of links not yet closed.
    #[must_use]
    pub fn open_links(&self) -> usize {
        self.peers.values().filter(|l| l.state().is_open()).count()
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[must_use]
    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    #[must_use]
    pub fn media(&self) -> Option<&LocalMedia> {
        self.media.as_ref()
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.media.as_ref().is_some_and(LocalMedia::is_muted)
    }

    #[must_use]
    pub fn is_camera_off(&self) -> bool {
        self.media.as_ref().is_some_and(LocalMedia::is_camera_off)
    }

    #[must_use]
    pub fn is_screen_sharing(&self) -> bool {
        self.media.as_ref().is_some_and(LocalMedia::is_screen_sharing)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn local_info(&self) -> ParticipantInfo {
        ParticipantInfo { id: self.user.id.clone(), name: self.user.name.clone(), is_host: self.user.is_host, hand_raised: false }
    }

    fn require_joined(&self) -> Result<(), ClassroomError> {
        match self.phase {
            Phase::Joined => Ok(()),
            Phase::Idle => Err(ClassroomError::NotJoined),
            Phase::Left => Err(ClassroomError::SessionClosed),
        }
    }

    fn media_mut(&mut self) -> Result<&mut LocalMedia, ClassroomError> {
        self.require_joined()?;
        self.media.as_mut().ok_or(ClassroomError::NotJoined)
    }

    fn send(&mut self, event: RoomEvent) -> Result<(), ClassroomError> {
        let link = self.link.as_mut().ok_or(ClassroomError::SessionClosed)?;
        link.send(event.to_frame(&self.session_id))
    }
}

/// A link created while sharing the screen starts with the screen track.
fn swap_to_screen(link: &mut PeerLink, media: &LocalMedia) {
    if !media.is_screen_sharing() {
        return;
    }
    let (Some(camera), Some(screen)) = (media.camera().video_track(), media.outgoing_video()) else {
        return;
    };
    if let Err(e) = link.replace_track(camera, screen) {
        warn!(peer = link.peer_id(), error = %e, "could not put screen track on new link");
        link.close();
    }
}

impl Drop for Classroom {
    fn drop(&mut self) {
        self.leave();
    }
}
