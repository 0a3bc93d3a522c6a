//! In-memory host services shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use frames::Frame;
use serde_json::json;

use crate::error::{ClassroomError, MediaError, PeerError};
use crate::media::{MediaDevices, MediaStream, MediaTrack, TrackHandle, TrackKind};
use crate::peer::{PeerConnection, PeerFactory, Signal};
use crate::session::SignalingLink;

/// Ordered record of host-side effects, shared by every fake in a test.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Debug)]
pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    live: AtomicBool,
    log: EventLog,
}

impl FakeTrack {
    pub fn handle(id: &str, kind: TrackKind, log: &EventLog) -> TrackHandle {
        Arc::new(Self {
            id: id.to_owned(),
            kind,
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
            log: log.clone(),
        })
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.log.push(format!("stop:{}", self.id));
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Stream with a `mic` audio track and a `cam` video track.
pub fn camera_stream(log: &EventLog) -> MediaStream {
    MediaStream::new("camera", vec![FakeTrack::handle("mic", TrackKind::Audio, log), FakeTrack::handle("cam", TrackKind::Video, log)])
}

#[derive(Debug, Default)]
pub struct FakeDevices {
    pub log: EventLog,
    pub deny_camera: bool,
    pub deny_screen: bool,
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn user_media(&self) -> Result<MediaStream, MediaError> {
        if self.deny_camera {
            return Err(MediaError::PermissionDenied);
        }
        Ok(camera_stream(&self.log))
    }

    async fn display_media(&self) -> Result<MediaStream, MediaError> {
        if self.deny_screen {
            return Err(MediaError::Aborted("picker dismissed".into()));
        }
        Ok(MediaStream::new("screen", vec![FakeTrack::handle("screen", TrackKind::Video, &self.log)]))
    }
}

/// Peer backend that records every call. Peers listed in `fail_create` cannot
/// be created; peers in `fail_replace` refuse track swaps.
#[derive(Debug, Default)]
pub struct FakeFactory {
    pub log: EventLog,
    pub fail_create: Vec<String>,
    pub fail_replace: Vec<String>,
}

impl FakeFactory {
    fn conn(&self, peer_id: &str) -> Box<dyn PeerConnection> {
        Box::new(FakeConn {
            peer_id: peer_id.to_owned(),
            fail_replace: self.fail_replace.iter().any(|p| p == peer_id),
            log: self.log.clone(),
        })
    }

    fn check(&self, peer_id: &str) -> Result<(), PeerError> {
        if self.fail_create.iter().any(|p| p == peer_id) {
            return Err(PeerError::Backend(format!("cannot reach {peer_id}")));
        }
        Ok(())
    }
}

impl PeerFactory for FakeFactory {
    fn initiate(&mut self, peer_id: &str, stream: &MediaStream) -> Result<(Box<dyn PeerConnection>, Signal), PeerError> {
        self.check(peer_id)?;
        self.log.push(format!("initiate:{peer_id}"));
        Ok((self.conn(peer_id), json!({ "type": "offer", "to": peer_id, "stream": stream.id() })))
    }

    fn respond(&mut self, peer_id: &str, offer: &Signal, _stream: &MediaStream) -> Result<(Box<dyn PeerConnection>, Signal), PeerError> {
        self.check(peer_id)?;
        self.log.push(format!("respond:{peer_id}"));
        Ok((self.conn(peer_id), json!({ "type": "answer", "to": peer_id, "re": offer })))
    }
}

pub struct FakeConn {
    peer_id: String,
    fail_replace: bool,
    log: EventLog,
}

impl PeerConnection for FakeConn {
    fn signal(&mut self, _signal: &Signal) -> Result<(), PeerError> {
        self.log.push(format!("signal:{}", self.peer_id));
        Ok(())
    }

    fn replace_track(&mut self, old: &TrackHandle, new: &TrackHandle) -> Result<(), PeerError> {
        if self.fail_replace {
            return Err(PeerError::Backend("sender gone".into()));
        }
        self.log.push(format!("replace:{}:{}->{}", self.peer_id, old.id(), new.id()));
        Ok(())
    }

    fn remote_stream_id(&self) -> Option<String> {
        Some(format!("stream-{}", self.peer_id))
    }

    fn destroy(&mut self) {
        self.log.push(format!("destroy:{}", self.peer_id));
    }
}

/// Signaling link that keeps what was sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    pub sent: Arc<Mutex<Vec<Frame>>>,
    pub log: EventLog,
}

impl RecordingLink {
    pub fn frames(&self) -> Vec<Frame> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn syscalls(&self) -> Vec<String> {
        self.frames().into_iter().map(|f| f.syscall).collect()
    }
}

impl SignalingLink for RecordingLink {
    fn send(&mut self, frame: Frame) -> Result<(), ClassroomError> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(frame);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.log.push("disconnect");
    }
}
