//! Platform output collaborators.
//!
//! Speech synthesis, media playback and on-screen messages are provided by
//! the host platform. The engine only sequences calls to these traits.

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

/// One utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    /// Text to speak.
    pub text: String,
    /// Locale tag, e.g. `sv-SE`.
    pub language: String,
    /// Rate multiplier, 1.0 is normal.
    pub rate: f32,
    /// Pitch multiplier, 1.0 is normal.
    pub pitch: f32,
}

/// Text-to-speech engine.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether an utterance is currently playing.
    async fn is_speaking(&self) -> bool;
    /// Start speaking; returns once the utterance has started.
    async fn speak(&self, request: SpeechRequest) -> Result<()>;
    /// Stop any utterance in progress.
    async fn stop(&self) -> Result<()>;
}

/// Kind of media playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio clip.
    Audio,
    /// Video clip.
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// One playback to start.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    /// Audio or video.
    pub kind: MediaKind,
    /// Media filename.
    pub file: String,
    /// Gain, 1.0 is full volume.
    pub volume: f64,
}

/// Live playback resource.
#[async_trait]
pub trait PlaybackHandle: Send {
    /// Stop playing.
    async fn stop(&mut self) -> Result<()>;
    /// Release the underlying resource.
    async fn unload(&mut self) -> Result<()>;
    /// Whether playback has ended on its own. Finished handles are released
    /// the next time the engine starts a clip.
    fn is_finished(&self) -> bool {
        false
    }
}

/// Audio/video player.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Begin playback; the returned handle stops and releases it.
    async fn play(&self, request: PlaybackRequest) -> Result<Box<dyn PlaybackHandle>>;
}

/// Kind of on-screen message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Scene text.
    Text,
    /// Subtitle line.
    Subtitle,
}

/// Transient on-screen message surface.
pub trait MessageDisplay: Send + Sync {
    /// Show `text` to the audience member.
    fn show(&self, kind: MessageKind, text: &str) -> Result<()>;
}
