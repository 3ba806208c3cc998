//! Cue dispatch.
//!
//! Every cue source (simulator, beacon listener, manual trigger) ends in the
//! same step: resolve the id against the bound playlist, notify observers,
//! then execute the cue's actions.
//!
//! Resolution happens synchronously at trigger time and binds the cue to the
//! engine's current stop generation. The returned [`PendingCue`] can then be
//! run on any task; an emergency stop issued in between still cancels it.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::{ActionEngine, ExecutionReport};
use crate::error::{Error, Result};
use crate::events::{EventBus, SessionEvent};
use crate::playlist::model::{Cue, Playlist};
use crate::types::CueId;

/// Resolves cue ids and hands cues to the engine.
pub struct CueDispatcher {
    engine: Arc<ActionEngine>,
    events: EventBus,
}

impl CueDispatcher {
    /// Create a dispatcher.
    pub fn new(engine: Arc<ActionEngine>, events: EventBus) -> Self {
        Self { engine, events }
    }

    /// The engine cues are executed on.
    pub fn engine(&self) -> &Arc<ActionEngine> {
        &self.engine
    }

    /// Session event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Find `cue_id` in `playlist`.
    pub fn resolve(playlist: &Playlist, cue_id: &CueId) -> Result<Cue> {
        playlist
            .find_cue(cue_id)
            .cloned()
            .ok_or_else(|| Error::UnknownCue(cue_id.to_string()))
    }

    /// Resolve and notify now; the returned cue runs when awaited. Unknown
    /// ids are logged and yield `None`.
    pub fn prepare(&self, playlist: &Playlist, cue_id: &CueId) -> Option<PendingCue> {
        let cue = match Self::resolve(playlist, cue_id) {
            Ok(cue) => cue,
            Err(e) => {
                tracing::warn!(playlist_id = %playlist.playlist_id, error = %e, "Ignoring trigger");
                return None;
            }
        };

        tracing::info!(%cue_id, actions = cue.actions.len(), "Cue triggered");
        self.events.emit(SessionEvent::CueTriggered {
            cue_id: cue_id.clone(),
            cue: cue.clone(),
            timestamp: Utc::now(),
        });

        Some(PendingCue {
            engine: Arc::clone(&self.engine),
            stop: self.engine.stop_token(),
            cue,
        })
    }

    /// Resolve, notify, execute. Unknown ids are logged and ignored.
    pub fn dispatch(
        &self,
        playlist: &Playlist,
        cue_id: &CueId,
    ) -> impl Future<Output = Option<ExecutionReport>> + Send + 'static {
        run_pending(self.prepare(playlist, cue_id))
    }
}

/// A triggered cue waiting to execute.
pub struct PendingCue {
    engine: Arc<ActionEngine>,
    stop: CancellationToken,
    cue: Cue,
}

impl PendingCue {
    /// Execute the cue's actions.
    pub async fn run(self) -> ExecutionReport {
        let cue_id = &self.cue.id;
        let report = self
            .engine
            .execute_actions_until(&self.cue.actions, cue_id, &self.stop)
            .await;
        if report.failed > 0 {
            tracing::warn!(%cue_id, failed = report.failed, "Cue finished with failed actions");
        }
        report
    }
}

/// Run `pending` if there is one.
pub async fn run_pending(pending: Option<PendingCue>) -> Option<ExecutionReport> {
    Some(pending?.run().await)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::engine::console::ConsoleOutput;
    use crate::playlist::model::CueAction;
    use crate::types::PlaylistId;

    fn playlist() -> Playlist {
        Playlist {
            playlist_id: PlaylistId::from("p"),
            theater_name: "T".into(),
            show_name: "S".into(),
            version: "1".into(),
            ble_uuid: "e2c56db5-dffb-48d2-b060-d0f5a71096e0".into(),
            checksum: String::new(),
            cues: vec![Cue { id: CueId::from("1.1"), actions: vec![CueAction::tts("Hej")] }],
            media_files: vec![],
            created_at: String::new(),
        }
    }

    #[tokio::test]
    async fn notification_precedes_execution() {
        let output = ConsoleOutput::new();
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let dispatcher = CueDispatcher::new(Arc::new(ActionEngine::with_console(&output)), events);

        let report = dispatcher.dispatch(&playlist(), &CueId::from("1.1")).await.unwrap();
        assert_eq!(report.executed, 1);

        match rx.recv().await.unwrap() {
            SessionEvent::CueTriggered { cue_id, cue, .. } => {
                assert_eq!(cue_id, CueId::from("1.1"));
                assert_eq!(cue.actions.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(output.spoken(), vec!["Hej"]);
    }

    #[tokio::test]
    async fn unknown_cue_is_a_no_op() {
        let output = ConsoleOutput::new();
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let dispatcher = CueDispatcher::new(Arc::new(ActionEngine::with_console(&output)), events);

        assert!(dispatcher.dispatch(&playlist(), &CueId::from("9.9")).await.is_none());
        assert!(rx.try_recv().is_err());
        assert!(output.entries().is_empty());
        assert!(matches!(
            CueDispatcher::resolve(&playlist(), &CueId::from("9.9")),
            Err(Error::UnknownCue(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_between_trigger_and_run_cancels_cue() {
        let output = ConsoleOutput::new();
        let dispatcher =
            CueDispatcher::new(Arc::new(ActionEngine::with_console(&output)), EventBus::default());

        let pending = dispatcher.prepare(&playlist(), &CueId::from("1.1")).unwrap();
        dispatcher.engine().stop_all_actions().await;

        let report = pending.run().await;
        assert!(report.cancelled);
        assert!(output.spoken().is_empty());

        // Cues triggered after the stop play normally.
        let report = dispatcher.dispatch(&playlist(), &CueId::from("1.1")).await.unwrap();
        assert_eq!(report.executed, 1);
    }
}
