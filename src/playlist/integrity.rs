//! Playlist integrity verification.
//!
//! The checksum is `sha256(canonical_json(cues) + salt)` rendered as lowercase
//! hex. Canonicalization must stay bit-exact with the issuing service:
//! - each action becomes `{delay, language, text, type}` with defaults
//!   (`0`, `""`, trimmed `""`), plus `pitch`/`rate`/`volume` only when present;
//! - each cue becomes `{actions, id}`;
//! - cues are sorted by the id *string*, so `"10.1"` sorts before `"2.1"`;
//! - object keys are emitted in ascending order with no whitespace.
//!
//! The salt is `APP_SECRET + playlistId + date token + SALT_SUFFIX`, where the
//! date token is the first `YYYY-MM-DD` or `YYYYMMDD` run in the playlist id
//! normalised to `YYYYMMDD` (empty when the id carries no date).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::constants::integrity::{APP_SECRET, SALT_SUFFIX};
use crate::error::{Error, Result};
use crate::playlist::model::{Cue, CueAction, Playlist};

/// Regex matching the date token inside a playlist id.
#[allow(clippy::expect_used)]
static RE_DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})-?(\d{2})-?(\d{2})").expect("valid regex: RE_DATE_TOKEN")
});

/// How a failed integrity check affects a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityMode {
    /// Reject playlists whose checksum is missing or wrong.
    #[default]
    Enforce,
    /// Log the failure and keep loading (authoring only).
    Warn,
}

/// Check a playlist under the given mode.
pub fn check(playlist: &Playlist, mode: IntegrityMode) -> Result<()> {
    if verify(playlist) {
        return Ok(());
    }
    let reason = if playlist.checksum.trim().is_empty() {
        "checksum missing"
    } else {
        "checksum mismatch"
    };
    match mode {
        IntegrityMode::Enforce => Err(Error::integrity(playlist.playlist_id.as_str(), reason)),
        IntegrityMode::Warn => {
            tracing::warn!(
                playlist_id = %playlist.playlist_id,
                reason,
                "Integrity check failed, loading anyway (warn mode)"
            );
            Ok(())
        }
    }
}

/// Verify the attached checksum. Fails closed on a missing checksum.
pub fn verify(playlist: &Playlist) -> bool {
    if playlist.checksum.trim().is_empty() {
        tracing::warn!(playlist_id = %playlist.playlist_id, "Playlist has no checksum");
        return false;
    }

    let computed = compute_checksum(playlist);
    let valid = computed == playlist.checksum;
    if valid {
        tracing::debug!(playlist_id = %playlist.playlist_id, "Checksum valid");
    } else {
        tracing::warn!(
            playlist_id = %playlist.playlist_id,
            expected = %playlist.checksum,
            computed = %computed,
            "Checksum mismatch"
        );
    }
    valid
}

/// Compute the checksum and store it on the playlist.
pub fn sign(playlist: &mut Playlist) {
    playlist.checksum = compute_checksum(playlist);
}

/// Checksum the issuing service is expected to attach.
pub fn compute_checksum(playlist: &Playlist) -> String {
    let canonical = canonical_json(&canonical_cues(&playlist.cues));
    let salt = derive_salt(playlist.playlist_id.as_str());

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Per-playlist salt.
pub fn derive_salt(playlist_id: &str) -> String {
    format!("{APP_SECRET}{playlist_id}{}{SALT_SUFFIX}", date_token(playlist_id))
}

/// `YYYYMMDD` date embedded in a playlist id, or an empty string.
pub fn date_token(playlist_id: &str) -> String {
    RE_DATE_TOKEN
        .captures(playlist_id)
        .map(|caps| format!("{}{}{}", &caps[1], &caps[2], &caps[3]))
        .unwrap_or_default()
}

/// Canonical cue array, sorted by id string.
pub fn canonical_cues(cues: &[Cue]) -> Value {
    let mut sorted: Vec<&Cue> = cues.iter().collect();
    sorted.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

    Value::Array(
        sorted
            .into_iter()
            .map(|cue| {
                json!({
                    "id": cue.id.as_str(),
                    "actions": cue.actions.iter().map(canonical_action).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

fn canonical_action(action: &CueAction) -> Value {
    let mut record = Map::new();
    record.insert("type".into(), json!(action.kind.as_str()));
    record.insert("text".into(), json!(action.text.as_deref().map_or("", str::trim)));
    record.insert("language".into(), json!(action.language.as_deref().unwrap_or("")));
    record.insert("delay".into(), json!(action.delay.unwrap_or(0)));
    let optional = [("volume", action.volume), ("pitch", action.pitch), ("rate", action.rate)];
    for (key, value) in optional {
        if let Some(value) = value {
            record.insert(key.into(), json!(value));
        }
    }
    Value::Object(record)
}

/// Serialize with keys sorted and no whitespace, independent of map ordering.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::playlist::model::ActionKind;
    use crate::types::CueId;

    fn playlist() -> Playlist {
        Playlist {
            playlist_id: "hamlet-2024-03-15".into(),
            theater_name: "Stadsteatern".into(),
            show_name: "Hamlet".into(),
            version: "1.0.0".into(),
            ble_uuid: "e2c56db5-dffb-48d2-b060-d0f5a71096e0".into(),
            checksum: String::new(),
            cues: vec![
                Cue { id: CueId::from("1.1"), actions: vec![CueAction::tts("Ridån går upp")] },
                Cue {
                    id: CueId::from("1.2"),
                    actions: vec![
                        CueAction::tts("Hamlet kliver fram").with_delay(500),
                        CueAction {
                            file: Some("thunder.mp3".into()),
                            volume: Some(0.5),
                            ..CueAction::new(ActionKind::Audio)
                        },
                    ],
                },
                Cue { id: CueId::from("2.1"), actions: vec![CueAction::tts("Akt två")] },
            ],
            media_files: vec![],
            created_at: "2024-03-01T10:00:00Z".into(),
        }
    }

    fn signed() -> Playlist {
        let mut p = playlist();
        sign(&mut p);
        p
    }

    #[test]
    fn signed_playlist_verifies() {
        let p = signed();
        assert_eq!(p.checksum.len(), 64);
        assert!(verify(&p));
        assert!(check(&p, IntegrityMode::Enforce).is_ok());
    }

    #[test]
    fn missing_checksum_fails_closed() {
        let p = playlist();
        assert!(!verify(&p));
        let err = check(&p, IntegrityMode::Enforce).unwrap_err();
        assert!(matches!(err, Error::Integrity { ref reason, .. } if reason == "checksum missing"));
    }

    #[test]
    fn warn_mode_lets_mismatch_through() {
        let mut p = signed();
        p.cues[0].actions[0].text = Some("changed".into());
        assert!(check(&p, IntegrityMode::Warn).is_ok());
        assert!(check(&p, IntegrityMode::Enforce).is_err());
    }

    #[test]
    fn altered_content_fails() {
        let mut p = signed();
        p.cues[1].actions[0].delay = Some(501);
        assert!(!verify(&p));

        let mut p = signed();
        p.cues[2].actions[0].text = Some("Akt tvÅ".into());
        assert!(!verify(&p));

        let mut p = signed();
        p.cues[1].actions[1].volume = None;
        assert!(!verify(&p));
    }

    #[test]
    fn storage_order_does_not_matter() {
        let mut p = signed();
        p.cues.reverse();
        assert!(verify(&p));
        p.cues.swap(0, 1);
        assert!(verify(&p));
    }

    #[test]
    fn checksum_is_bound_to_playlist_id() {
        let mut p = signed();
        p.playlist_id = "hamlet-2024-03-16".into();
        assert!(!verify(&p));
    }

    #[test]
    fn canonical_form_is_stable() {
        let cues = vec![
            Cue {
                id: CueId::from("2.1"),
                actions: vec![CueAction {
                    text: Some("  B ".into()),
                    ..CueAction::new("text".into())
                }],
            },
            Cue { id: CueId::from("10.1"), actions: vec![CueAction::new("tts".into())] },
        ];
        assert_eq!(
            canonical_json(&canonical_cues(&cues)),
            concat!(
                r#"[{"actions":[{"delay":0,"language":"","text":"","type":"tts"}],"id":"10.1"},"#,
                r#"{"actions":[{"delay":0,"language":"","text":"B","type":"text"}],"id":"2.1"}]"#
            )
        );
    }

    #[test]
    fn date_token_extraction() {
        assert_eq!(date_token("hamlet-2024-03-15"), "20240315");
        assert_eq!(date_token("show_20231201_v2"), "20231201");
        assert_eq!(date_token("no-date-here"), "");
        assert!(derive_salt("x-2024-01-02").contains("x-2024-01-0220240102"));
    }
}
