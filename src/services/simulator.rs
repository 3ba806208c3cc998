//! Cue simulator.
//!
//! Stands in for in-venue beacons during rehearsal and authoring. Cues fire
//! either on manual trigger or from an auto-playback timer that walks the
//! playlist in stored order at a fixed period.
//!
//! Auto-playback does not wait for a cue to finish before firing the next
//! one; the timer advances strictly on the interval.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::engine::ExecutionReport;
use crate::events::SessionEvent;
use crate::playlist::model::{Playlist, Scene};
use crate::services::dispatch::{run_pending, CueDispatcher, PendingCue};
use crate::types::CueId;

/// Snapshot of simulator state for display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimulatorStatus {
    /// Whether a playlist is bound.
    pub is_running: bool,
    /// Show name of the bound playlist.
    pub show_name: Option<String>,
    /// Whether the auto-playback timer is active.
    pub auto_playback_active: bool,
    /// Number of cues in the bound playlist.
    pub total_cues: usize,
    /// Index of the cue auto-playback fires next.
    pub next_cue_index: usize,
}

#[derive(Default)]
struct State {
    playlist: Option<Arc<Playlist>>,
    running: bool,
    cursor: usize,
    timer: Option<JoinHandle<()>>,
}

/// Manual and timed cue source.
#[derive(Clone)]
pub struct CueSimulator {
    dispatcher: Arc<CueDispatcher>,
    state: Arc<Mutex<State>>,
}

impl CueSimulator {
    /// Create an idle simulator.
    pub fn new(dispatcher: Arc<CueDispatcher>) -> Self {
        Self {
            dispatcher,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Bind `playlist` and mark the simulator running, replacing any
    /// previous binding.
    pub fn start_simulation(&self, playlist: Arc<Playlist>) {
        self.stop_auto_playback();
        let show_name = playlist.show_name.clone();
        {
            let mut state = self.state.lock();
            state.playlist = Some(playlist);
            state.running = true;
        }
        tracing::info!(show = %show_name, "Simulator started");
        self.dispatcher.events().emit(SessionEvent::SimulatorStarted { show_name });
    }

    /// Unbind the playlist and stop auto-playback.
    pub fn stop_simulation(&self) {
        self.stop_auto_playback();
        let was_running = {
            let mut state = self.state.lock();
            state.playlist = None;
            std::mem::take(&mut state.running)
        };
        if was_running {
            tracing::info!("Simulator stopped");
            self.dispatcher.events().emit(SessionEvent::SimulatorStopped);
        }
    }

    /// Bound playlist, if any.
    pub fn current_playlist(&self) -> Option<Arc<Playlist>> {
        self.state.lock().playlist.clone()
    }

    /// Resolve one cue against the bound playlist without running it.
    /// Unknown ids and unbound simulators are logged no-ops.
    pub fn prepare_cue(&self, cue_id: &CueId) -> Option<PendingCue> {
        let Some(playlist) = self.current_playlist() else {
            tracing::warn!(%cue_id, "No playlist bound, ignoring trigger");
            return None;
        };
        self.dispatcher.prepare(&playlist, cue_id)
    }

    /// Fire one cue. Unknown ids and unbound simulators are logged no-ops;
    /// execution failures never propagate.
    pub fn trigger_cue(
        &self,
        cue_id: &CueId,
    ) -> impl Future<Output = Option<ExecutionReport>> + Send + 'static {
        run_pending(self.prepare_cue(cue_id))
    }

    /// Start firing cues every `interval`, beginning immediately.
    ///
    /// A running auto-playback is restarted from the first cue.
    pub fn start_auto_playback(&self, interval: Duration) {
        if self.current_playlist().is_none() {
            tracing::warn!("No playlist bound, auto-playback not started");
            return;
        }
        self.stop_auto_playback();

        let simulator = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !simulator.advance() {
                    break;
                }
            }
        });
        self.state.lock().timer = Some(handle);

        #[allow(clippy::cast_possible_truncation)]
        let interval_ms = interval.as_millis() as u64;
        tracing::info!(interval_ms, "Auto-playback started");
        self.dispatcher.events().emit(SessionEvent::AutoPlaybackStarted { interval_ms });
    }

    /// One auto-playback tick. Returns `false` once the cue list is exhausted.
    fn advance(&self) -> bool {
        let next = {
            let mut state = self.state.lock();
            let next = state
                .playlist
                .as_ref()
                .and_then(|playlist| playlist.cues.get(state.cursor))
                .map(|cue| cue.id.clone());
            match next {
                Some(id) => {
                    state.cursor += 1;
                    Some(id)
                }
                None => {
                    state.cursor = 0;
                    // The running task is this one; dropping the handle detaches it.
                    state.timer = None;
                    None
                }
            }
        };

        let Some(cue_id) = next else {
            tracing::info!("Auto-playback reached the last cue");
            self.dispatcher.events().emit(SessionEvent::AutoPlaybackStopped);
            return false;
        };

        if let Some(cue) = self.prepare_cue(&cue_id) {
            tokio::spawn(cue.run());
        }
        true
    }

    /// Cancel the auto-playback timer and rewind the cursor. Safe when not
    /// running; the stopped notification is only emitted if a timer was active.
    pub fn stop_auto_playback(&self) {
        let timer = {
            let mut state = self.state.lock();
            state.cursor = 0;
            state.timer.take()
        };
        if let Some(timer) = timer {
            timer.abort();
            tracing::info!("Auto-playback stopped");
            self.dispatcher.events().emit(SessionEvent::AutoPlaybackStopped);
        }
    }

    /// Stop auto-playback and every in-flight action.
    pub async fn emergency_stop(&self) {
        tracing::warn!("Emergency stop");
        self.stop_auto_playback();
        self.dispatcher.engine().stop_all_actions().await;
        self.dispatcher.events().emit(SessionEvent::EmergencyStop);
    }

    /// Cues of the bound playlist grouped by scene.
    pub fn get_scenes(&self) -> Vec<Scene> {
        self.current_playlist().map(|p| p.scenes()).unwrap_or_default()
    }

    /// Current simulator state.
    pub fn status(&self) -> SimulatorStatus {
        let state = self.state.lock();
        SimulatorStatus {
            is_running: state.running,
            show_name: state.playlist.as_ref().map(|p| p.show_name.clone()),
            auto_playback_active: state.timer.as_ref().is_some_and(|t| !t.is_finished()),
            total_cues: state.playlist.as_ref().map_or(0, |p| p.cues.len()),
            next_cue_index: state.cursor,
        }
    }
}
