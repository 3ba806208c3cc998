//! Playlist data model.
//!
//! These types mirror the playlist wire format served by the show authoring
//! service and stored locally after download.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::types::{CueId, PlaylistId, SceneNumber};

/// A downloaded, versioned show script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    /// Stable identifier; one stored playlist per id.
    pub playlist_id: PlaylistId,
    /// Venue name.
    pub theater_name: String,
    /// Production name.
    pub show_name: String,
    /// Semantic version of the script.
    #[serde(default)]
    pub version: String,
    /// Proximity beacon UUID broadcasting this show's cues.
    #[serde(rename = "bleUUID")]
    pub ble_uuid: String,
    /// Digest binding the cue content to this playlist.
    #[serde(default)]
    pub checksum: String,
    /// Cues in stored order.
    pub cues: Vec<Cue>,
    /// Referenced media filenames.
    #[serde(default)]
    pub media_files: Vec<String>,
    /// Creation timestamp, informational only.
    #[serde(default)]
    pub created_at: String,
}

impl Playlist {
    /// Find a cue by id.
    pub fn find_cue(&self, id: &CueId) -> Option<&Cue> {
        self.cues.iter().find(|cue| &cue.id == id)
    }

    /// Group cues by scene, keeping per-scene stored order.
    ///
    /// Scenes come back in ascending numeric order.
    pub fn scenes(&self) -> Vec<Scene> {
        let mut grouped: BTreeMap<SceneNumber, Vec<Cue>> = BTreeMap::new();
        for cue in &self.cues {
            grouped.entry(cue.id.scene()).or_default().push(cue.clone());
        }
        grouped
            .into_iter()
            .map(|(number, cues)| Scene { number, cues })
            .collect()
    }

    /// Metadata record for the playlist index.
    pub fn metadata(&self, downloaded_at: DateTime<Utc>) -> PlaylistMetadata {
        PlaylistMetadata {
            playlist_id: self.playlist_id.clone(),
            theater_name: self.theater_name.clone(),
            show_name: self.show_name.clone(),
            version: self.version.clone(),
            downloaded_at,
        }
    }
}

/// One addressable trigger point in the show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// `"<scene>.<position>"` identifier.
    pub id: CueId,
    /// Actions, executed strictly in order.
    pub actions: Vec<CueAction>,
}

/// Cues sharing a scene number.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Scene component of the cue ids.
    pub number: SceneNumber,
    /// Cues of this scene in stored order.
    pub cues: Vec<Cue>,
}

/// One unit of sensory output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueAction {
    /// Output kind.
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Text for tts/text/subtitle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Media file for audio/video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// TTS locale tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Milliseconds to wait before this action starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    /// Playback gain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    /// TTS pitch override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    /// TTS rate override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

impl CueAction {
    /// An action of the given kind with every optional field unset.
    pub const fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            text: None,
            file: None,
            language: None,
            delay: None,
            volume: None,
            pitch: None,
            rate: None,
        }
    }

    /// A text-to-speech action.
    pub fn tts(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::new(ActionKind::Tts) }
    }

    /// Set the pre-action delay in milliseconds.
    #[must_use]
    pub const fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    /// Pre-action delay; zero when absent.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay.unwrap_or(0))
    }
}

/// Closed set of action kinds, plus the raw tag of anything unrecognized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    /// Text-to-speech narration.
    Tts,
    /// Audio playback.
    Audio,
    /// Video playback.
    Video,
    /// Transient on-screen text.
    Text,
    /// Subtitle line.
    Subtitle,
    /// Unrecognized type tag, skipped at execution time.
    Unknown(String),
}

impl ActionKind {
    /// Wire tag of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tts => "tts",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Text => "text",
            Self::Subtitle => "subtitle",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for ActionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "tts" => Self::Tts,
            "audio" => Self::Audio,
            "video" => Self::Video,
            "text" => Self::Text,
            "subtitle" => Self::Subtitle,
            _ => Self::Unknown(s),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index entry for a locally stored playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistMetadata {
    /// Playlist the entry describes.
    pub playlist_id: PlaylistId,
    /// Venue name.
    pub theater_name: String,
    /// Production name.
    pub show_name: String,
    /// Script version.
    pub version: String,
    /// When the playlist was last loaded.
    pub downloaded_at: DateTime<Utc>,
}
