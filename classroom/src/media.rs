//! Local media: tracks, streams, capture devices, and the mute/camera/screen
//! state of this participant.
//!
//! Tracks are shared handles. The same camera track object is attached to
//! every peer link, so enabling or disabling it is seen by all of them without
//! touching the links. Screen share swaps the outgoing video track in place.

#[cfg(test)]
#[path = "media_test.rs"]
mod media_test;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One host media track.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;

    /// Mute or unmute without releasing the device.
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;

    /// Release the device. A stopped track never produces media again.
    fn stop(&self);
    fn is_live(&self) -> bool;
}

pub type TrackHandle = Arc<dyn MediaTrack>;

/// A set of tracks captured together.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<TrackHandle>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<TrackHandle>) -> Self {
        Self { id: id.into(), tracks }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn tracks(&self) -> &[TrackHandle] {
        &self.tracks
    }

    #[must_use]
    pub fn audio_track(&self) -> Option<&TrackHandle> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Audio)
    }

    #[must_use]
    pub fn video_track(&self) -> Option<&TrackHandle> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Video)
    }

    /// Stop every track.
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
            debug!(track = track.id(), "track stopped");
        }
    }
}

/// Host capture devices. Both calls may suspend on a permission prompt.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Camera and microphone.
    async fn user_media(&self) -> Result<MediaStream, MediaError>;

    /// A screen or window picked by the user.
    async fn display_media(&self) -> Result<MediaStream, MediaError>;
}

/// This participant's captured media.
#[derive(Debug)]
pub struct LocalMedia {
    camera: MediaStream,
    screen: Option<MediaStream>,
}

impl LocalMedia {
    #[must_use]
    pub fn new(camera: MediaStream) -> Self {
        Self { camera, screen: None }
    }

    /// The camera and microphone stream offered to new peers.
    #[must_use]
    pub fn camera(&self) -> &MediaStream {
        &self.camera
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.camera.audio_track().is_some_and(|t| !t.is_enabled())
    }

    /// Flip the microphone; returns whether it is now muted.
    pub fn toggle_mute(&mut self) -> bool {
        if let Some(track) = self.camera.audio_track() {
            track.set_enabled(!track.is_enabled());
        }
        self.is_muted()
    }

    #[must_use]
    pub fn is_camera_off(&self) -> bool {
        self.camera.video_track().is_some_and(|t| !t.is_enabled())
    }

    /// Flip the camera; returns whether it is now off.
    pub fn toggle_camera(&mut self) -> bool {
        if let Some(track) = self.camera.video_track() {
            track.set_enabled(!track.is_enabled());
        }
        self.is_camera_off()
    }

    #[must_use]
    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_some()
    }

    /// The video track peers currently receive.
    #[must_use]
    pub fn outgoing_video(&self) -> Option<&TrackHandle> {
        self.screen
            .as_ref()
            .and_then(MediaStream::video_track)
            .or_else(|| self.camera.video_track())
    }

    /// Start sharing `screen`. The caller swaps tracks on open links.
    pub fn begin_screen_share(&mut self, screen: MediaStream) {
        if let Some(previous) = self.screen.replace(screen) {
            previous.stop();
        }
    }

    /// Stop sharing and hand back the screen stream, already stopped.
    pub fn end_screen_share(&mut self) -> Option<MediaStream> {
        let screen = self.screen.take()?;
        screen.stop();
        Some(screen)
    }

    /// Stop every local track, screen first.
    pub fn stop_all(&mut self) {
        if let Some(screen) = self.screen.take() {
            screen.stop();
        }
        self.camera.stop();
    }
}
