//! Application error types.
//!
//! Load-time failures (transport, format, schema, integrity) propagate to the
//! caller. Runtime failures (decode, action, unknown cue) are logged where they
//! happen and never stop a running show.

use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types with specific context for actionable debugging
#[derive(Debug, Error)]
pub enum Error {
    /// Network/fetch failure reaching a playlist source
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable error description.
        message: String,
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        /// Actionable suggestion for resolving the error.
        hint: Option<&'static str>,
    },

    /// Response body is not valid structured data
    #[error("Format error: {0}")]
    Format(String),

    /// Structurally valid document missing a required field
    #[error("Schema error in '{field}': {message}")]
    Schema {
        /// Name of the offending field.
        field: String,
        /// Description of the violation.
        message: String,
    },

    /// Checksum missing or mismatched
    #[error("Integrity check failed for playlist '{playlist_id}': {reason}")]
    Integrity {
        /// Playlist whose integrity check failed.
        playlist_id: String,
        /// Why the check failed.
        reason: String,
    },

    /// Malformed beacon advertisement
    #[error("Beacon decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A single cue action failed to execute
    #[error("Action '{kind}' failed: {message}")]
    Action {
        /// Action type that failed.
        kind: String,
        /// Description of the failure.
        message: String,
    },

    /// Trigger referenced a cue that is not in the bound playlist
    #[error("Unknown cue: {0}")]
    UnknownCue(String),

    /// Key/value store failure
    #[error("Store error for key '{key}': {message}")]
    Store {
        /// Key being read or written.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// IO error with path context
    #[error("IO error at {path:?}: {source}")]
    Io {
        /// The underlying IO error.
        source: std::io::Error,
        /// File path where the error occurred, if known.
        path: Option<std::path::PathBuf>,
    },

    /// Configuration error with guidance
    #[error("Configuration error: {message}. {hint}")]
    Config {
        /// Description of the configuration problem.
        message: String,
        /// Actionable guidance for fixing the issue.
        hint: &'static str,
    },

    /// Generic message error (escape hatch)
    #[error("{0}")]
    Msg(String),
}

/// Beacon payload decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload shorter than prefix + UUID + major + minor
    #[error("payload too short: {len} bytes")]
    TooShort {
        /// Number of bytes received.
        len: usize,
    },

    /// Hex transport encoding could not be parsed
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    /// Base64 transport encoding could not be parsed
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}

impl Error {
    /// Create a transport error without a response status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            hint: Some("Check your internet connection and try again"),
        }
    }

    /// Create a transport error with HTTP status
    pub fn transport_status(message: impl Into<String>, status: u16) -> Self {
        let hint = match status {
            401 | 403 => Some("The playlist link is not authorized"),
            404 => Some("The show could not be found - check the link"),
            408 | 429 => Some("The server is busy - wait a moment and try again"),
            500..=599 => Some("Playlist server error - try again later"),
            _ => None,
        };
        Self::Transport {
            message: message.into(),
            status: Some(status),
            hint,
        }
    }

    /// Create a schema error naming the offending field
    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema { field: field.into(), message: message.into() }
    }

    /// Create an integrity error
    pub fn integrity(playlist_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Integrity { playlist_id: playlist_id.into(), reason: reason.into() }
    }

    /// Create an action error
    pub fn action(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Action { kind: kind.into(), message: message.into() }
    }

    /// Create a store error
    pub fn store(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store { key: key.into(), message: message.into() }
    }

    /// Create an IO error with path context
    pub fn io(source: std::io::Error, path: impl Into<Option<std::path::PathBuf>>) -> Self {
        Self::Io { source, path: path.into() }
    }

    /// Create a config error with actionable hint
    pub fn config(message: impl Into<String>, hint: &'static str) -> Self {
        Self::Config { message: message.into(), hint }
    }

    /// Whether this error aborts a playlist load
    pub const fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Format(_) | Self::Schema { .. } | Self::Integrity { .. }
        )
    }

    /// Message shown to the audience member when a playlist download fails.
    ///
    /// Each load failure class gets its own wording so "corrupt download" and
    /// "tampered content" are never confused.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { message, hint: Some(hint), .. } => format!("{message}. {hint}"),
            Self::Transport { message, .. } => message.clone(),
            Self::Format(_) => "The downloaded show data is corrupt".to_string(),
            Self::Schema { field, .. } => {
                format!("The show data is incomplete (missing '{field}')")
            }
            Self::Integrity { .. } => {
                "The show could not be verified and was not installed".to_string()
            }
            other => other.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io { source: e, path: None }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Msg(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Msg(s.to_string())
    }
}
