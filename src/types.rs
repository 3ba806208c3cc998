//! Core type definitions for compile-time safety.
//!
//! This module provides newtype wrappers around string identifiers to prevent
//! accidental mixing of playlist ids and cue ids.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Playlist identifier, unique per stored playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub String);

impl PlaylistId {
    /// Create a new `PlaylistId` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PlaylistId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PlaylistId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PlaylistId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cue identifier in `"<scene>.<position>"` form, e.g. `"2.1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CueId(pub String);

impl CueId {
    /// Create a new `CueId` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Cue id carried by a beacon frame.
    pub fn from_beacon(major: u16, minor: u16) -> Self {
        Self(format!("{major}.{minor}"))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scene component: everything before the first `.`.
    pub fn scene(&self) -> SceneNumber {
        let scene = self.0.split_once('.').map_or(self.0.as_str(), |(scene, _)| scene);
        SceneNumber(scene.to_string())
    }
}

impl fmt::Display for CueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for CueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Scene component of a cue id.
///
/// Orders numerically when both sides are numbers, lexically otherwise, so
/// scene `"10"` sorts after scene `"9"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SceneNumber(pub String);

impl SceneNumber {
    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for SceneNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for SceneNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SceneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
