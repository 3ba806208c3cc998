//! Structural validation of a raw playlist document.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::playlist::model::Playlist;

/// Top-level string fields every playlist must carry.
const REQUIRED_STRINGS: [&str; 4] = ["playlistId", "theaterName", "showName", "bleUUID"];

/// Parse a response body into a validated playlist.
///
/// Invalid JSON is a format error; valid JSON that lacks required structure
/// is a schema error naming the first offending field.
pub fn parse_playlist(body: &str) -> Result<Playlist> {
    let document: Value = serde_json::from_str(body)
        .map_err(|e| Error::Format(format!("Invalid playlist JSON: {e}")))?;
    validate_structure(&document)?;
    serde_json::from_value(document).map_err(|e| Error::schema("playlist", e.to_string()))
}

/// Check required fields and cue shape.
pub fn validate_structure(document: &Value) -> Result<()> {
    if !document.is_object() {
        return Err(Error::schema("playlist", "document must be an object"));
    }

    for field in REQUIRED_STRINGS {
        match document.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => return Err(Error::schema(field, "must not be empty")),
            Some(_) => return Err(Error::schema(field, "must be a string")),
            None => return Err(Error::schema(field, "missing required field")),
        }
    }

    let cues = match document.get("cues") {
        Some(Value::Array(cues)) if !cues.is_empty() => cues,
        Some(Value::Array(_)) => return Err(Error::schema("cues", "must not be empty")),
        Some(_) => return Err(Error::schema("cues", "must be an array")),
        None => return Err(Error::schema("cues", "missing required field")),
    };

    for (idx, cue) in cues.iter().enumerate() {
        match cue.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => {}
            _ => return Err(Error::schema(format!("cues[{idx}].id"), "must be a non-empty string")),
        }
        if !cue.get("actions").is_some_and(Value::is_array) {
            return Err(Error::schema(format!("cues[{idx}].actions"), "must be an array"));
        }
    }

    Ok(())
}
