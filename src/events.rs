//! Session event bus.
//!
//! Observers (the show runner UI, tests) subscribe to a typed broadcast
//! channel. Dropping the receiver unsubscribes.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::constants::async_tasks::EVENT_BUS_CAPACITY;
use crate::playlist::model::Cue;
use crate::types::{CueId, PlaylistId};

/// Notifications emitted by the simulator, beacon listener and session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Simulator bound to a playlist.
    SimulatorStarted {
        /// Show now bound.
        show_name: String,
    },
    /// Simulator unbound.
    SimulatorStopped,
    /// A cue resolved and is about to execute.
    CueTriggered {
        /// Id of the triggered cue.
        cue_id: CueId,
        /// The resolved cue.
        cue: Cue,
        /// When the trigger happened.
        timestamp: DateTime<Utc>,
    },
    /// Auto-playback timer started.
    AutoPlaybackStarted {
        /// Period between cues.
        interval_ms: u64,
    },
    /// Auto-playback timer stopped (manually or after the last cue).
    AutoPlaybackStopped,
    /// Every in-flight action was cancelled.
    EmergencyStop,
    /// A show became active.
    ShowStarted {
        /// Active playlist.
        playlist_id: PlaylistId,
    },
    /// The active show ended.
    ShowExited,
    /// Long-press exit progress changed (0..=100).
    ExitProgress(u8),
    /// Long-press completed; the exit prompt should open.
    ExitConfirmationRequested,
}

/// Broadcast bus for [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; having no subscribers is fine.
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Session event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(SessionEvent::AutoPlaybackStarted { interval_ms: 10 });
        bus.emit(SessionEvent::AutoPlaybackStopped);

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::AutoPlaybackStarted { interval_ms: 10 });
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::AutoPlaybackStopped);
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        EventBus::default().emit(SessionEvent::EmergencyStop);
    }
}
