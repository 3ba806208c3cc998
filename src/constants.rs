//! Application constants.
//!
//! Centralizes magic numbers and configuration values for better maintainability.

/// Playlist integrity constants.
pub mod integrity {
    /// Application secret shared with the playlist issuing service.
    ///
    /// This is a shared-secret scheme, not a signature: anyone holding the
    /// binary can produce valid checksums.
    pub const APP_SECRET: &str = "theater-cue::accessibility::v1";

    /// Literal appended after the per-playlist salt components.
    pub const SALT_SUFFIX: &str = "::cues";
}

/// Speech synthesis constants.
pub mod speech {
    /// Locale used when a tts action has no language.
    pub const DEFAULT_LANGUAGE: &str = "sv-SE";

    /// Speaking rate, slightly slower than normal for comprehension.
    pub const RATE: f32 = 0.8;

    /// Normal pitch.
    pub const PITCH: f32 = 1.0;

    /// Pause after stopping an utterance before starting the next one.
    pub const SETTLE_MS: u64 = 100;
}

/// Media playback constants.
pub mod media {
    /// Gain used when an audio action has no volume.
    pub const DEFAULT_VOLUME: f64 = 1.0;
}

/// Cue simulator constants.
pub mod simulator {
    /// Default period between auto-played cues.
    pub const DEFAULT_INTERVAL_MS: u64 = 8000;
}

/// Long-press exit gesture constants.
pub mod exit_gesture {
    /// Accumulation tick.
    pub const TICK_MS: u64 = 30;

    /// Progress added per tick.
    pub const STEP: u8 = 3;

    /// Progress at which the exit prompt opens.
    pub const COMPLETE: u8 = 100;
}

/// Proximity beacon frame layout.
pub mod beacon {
    /// Company id + beacon type bytes skipped before the UUID.
    pub const PREFIX_LEN: usize = 4;

    /// UUID region length.
    pub const UUID_LEN: usize = 16;

    /// Minimum frame length: prefix, UUID, major, minor.
    pub const MIN_FRAME_LEN: usize = PREFIX_LEN + UUID_LEN + 4;

    /// Pause between replayed advertisements.
    pub const REPLAY_GAP_MS: u64 = 250;

    /// A cue id seen again within this long of its previous frame is the
    /// same broadcast, not a new trigger.
    pub const REPEAT_WINDOW_MS: u64 = 3000;
}

/// Key/value store keys.
pub mod store {
    /// Prefix of the per-playlist key.
    pub const PLAYLIST_KEY_PREFIX: &str = "playlist_";

    /// Key holding the ordered metadata list.
    pub const METADATA_KEY: &str = "playlists_metadata";
}

/// Async task constants.
pub mod async_tasks {
    /// Channel buffer size for async task communication.
    pub const CHANNEL_BUFFER_SIZE: usize = 64;

    /// Capacity of the session event broadcast channel.
    pub const EVENT_BUS_CAPACITY: usize = 256;
}

/// Terminal show runner.
pub mod ui {
    /// Input poll timeout per frame.
    pub const POLL_MS: u64 = 50;

    /// An exit hold counts as released when no repeat arrives within this window.
    pub const HOLD_RELEASE_MS: u64 = 600;

    /// Stage output lines kept on screen.
    pub const STAGE_LINES: usize = 200;
}
