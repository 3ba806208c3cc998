//! Show session controller.
//!
//! Owns the current playlist and the cue-source binding. A session is either
//! idle or active; starting a show binds a verified playlist to the simulator
//! or the beacon listener and engages the device controls, exiting reverses
//! every one of those steps.

/// Long-press exit gesture
pub mod exit_gesture;

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::beacon::listener::BeaconListener;
use crate::config::CueSourceMode;
use crate::engine::ExecutionReport;
use crate::error::Result;
use crate::events::{EventBus, SessionEvent};
use crate::playlist::model::Playlist;
use crate::services::dispatch::{run_pending, CueDispatcher};
use crate::services::playlist::PlaylistService;
use crate::services::simulator::CueSimulator;
use crate::types::{CueId, PlaylistId};
pub use exit_gesture::ExitGesture;

/// Platform device chrome toggled while a show runs.
pub trait DeviceControls: Send + Sync {
    /// Keep the screen awake (or allow it to sleep again).
    fn set_keep_awake(&self, enabled: bool);
    /// Hide (or restore) the system status bar.
    fn set_status_bar_hidden(&self, hidden: bool);
}

/// Device controls for hosts without any, such as a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessDevice;

impl DeviceControls for HeadlessDevice {
    fn set_keep_awake(&self, enabled: bool) {
        tracing::debug!(enabled, "Keep-awake");
    }

    fn set_status_bar_hidden(&self, hidden: bool) {
        tracing::debug!(hidden, "Status bar hidden");
    }
}

/// Session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No show running.
    Idle,
    /// A show is running.
    Active {
        /// Bound playlist.
        playlist: Arc<Playlist>,
        /// Where its cues come from.
        source: CueSourceMode,
    },
}

/// Collaborators of a [`ShowSession`].
pub struct SessionParts {
    /// Playlist load/save service.
    pub playlists: PlaylistService,
    /// Shared cue dispatch step.
    pub dispatcher: Arc<CueDispatcher>,
    /// Beacon scan loop owner.
    pub listener: Arc<BeaconListener>,
    /// Keep-awake and status bar.
    pub device: Arc<dyn DeviceControls>,
    /// Cue source bound on `start_show`.
    pub cue_source: CueSourceMode,
}

/// Orchestrates playlist, cue source and engine for one show at a time.
pub struct ShowSession {
    playlists: PlaylistService,
    dispatcher: Arc<CueDispatcher>,
    simulator: CueSimulator,
    listener: Arc<BeaconListener>,
    device: Arc<dyn DeviceControls>,
    cue_source: CueSourceMode,
    exit_gesture: ExitGesture,
    current: Mutex<Option<Arc<Playlist>>>,
    state: Mutex<SessionState>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl ShowSession {
    /// Create an idle session.
    pub fn new(parts: SessionParts) -> Self {
        let events = parts.dispatcher.events().clone();
        Self {
            simulator: CueSimulator::new(Arc::clone(&parts.dispatcher)),
            exit_gesture: ExitGesture::new(events),
            playlists: parts.playlists,
            dispatcher: parts.dispatcher,
            listener: parts.listener,
            device: parts.device,
            cue_source: parts.cue_source,
            current: Mutex::new(None),
            state: Mutex::new(SessionState::Idle),
            router: Mutex::new(None),
        }
    }

    /// Session event bus.
    pub fn events(&self) -> &EventBus {
        self.dispatcher.events()
    }

    /// Playlist service.
    pub fn playlists(&self) -> &PlaylistService {
        &self.playlists
    }

    /// The simulator cue source.
    pub fn simulator(&self) -> &CueSimulator {
        &self.simulator
    }

    /// Exit gesture.
    pub fn exit_gesture(&self) -> &ExitGesture {
        &self.exit_gesture
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Most recently loaded or started playlist.
    pub fn current_playlist(&self) -> Option<Arc<Playlist>> {
        self.current.lock().clone()
    }

    /// Load a playlist from `locator` and make it current.
    pub async fn load_playlist(&self, locator: &str) -> Result<Arc<Playlist>> {
        let playlist = Arc::new(self.playlists.load_from_source(locator).await?);
        *self.current.lock() = Some(Arc::clone(&playlist));
        Ok(playlist)
    }

    /// Start the show for a stored playlist. An unknown id is a logged no-op.
    ///
    /// A show already running is exited first.
    pub async fn start_show(&self, playlist_id: &PlaylistId) -> Result<()> {
        let Some(playlist) = self.playlists.get_playlist(playlist_id).await? else {
            tracing::warn!(%playlist_id, "Playlist not found, show not started");
            return Ok(());
        };
        self.exit_show().await;

        let playlist = Arc::new(playlist);
        match self.cue_source {
            CueSourceMode::Simulator => self.simulator.start_simulation(Arc::clone(&playlist)),
            CueSourceMode::Beacon => {
                let cues = self.listener.enable(&playlist.ble_uuid).await?;
                let handle = tokio::spawn(route_beacon_cues(
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&playlist),
                    cues,
                ));
                *self.router.lock() = Some(handle);
            }
        }

        self.device.set_keep_awake(true);
        self.device.set_status_bar_hidden(true);
        *self.current.lock() = Some(Arc::clone(&playlist));
        *self.state.lock() = SessionState::Active {
            playlist: Arc::clone(&playlist),
            source: self.cue_source,
        };

        tracing::info!(%playlist_id, source = ?self.cue_source, "Show started");
        self.events().emit(SessionEvent::ShowStarted { playlist_id: playlist_id.clone() });
        Ok(())
    }

    /// Trigger a cue of the active show by hand.
    ///
    /// The cue is resolved when this is called; an emergency stop issued
    /// before the returned future runs still cancels it.
    pub fn trigger_cue(
        &self,
        cue_id: &CueId,
    ) -> impl Future<Output = Option<ExecutionReport>> + Send + 'static {
        let pending = match self.state() {
            SessionState::Active { source: CueSourceMode::Simulator, .. } => {
                self.simulator.prepare_cue(cue_id)
            }
            SessionState::Active { playlist, source: CueSourceMode::Beacon } => {
                self.dispatcher.prepare(&playlist, cue_id)
            }
            SessionState::Idle => {
                tracing::warn!(%cue_id, "No active show, ignoring trigger");
                None
            }
        };
        run_pending(pending)
    }

    /// Start simulator auto-playback for the active show.
    pub fn start_auto_playback(&self, interval: Duration) {
        self.simulator.start_auto_playback(interval);
    }

    /// Halt auto-playback and every in-flight action.
    pub async fn emergency_stop(&self) {
        self.simulator.emergency_stop().await;
    }

    /// End the active show. Safe when idle.
    pub async fn exit_show(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), SessionState::Idle);
        if previous == SessionState::Idle {
            return;
        }

        self.exit_gesture.cancel();
        self.listener.disable().await;
        let router = self.router.lock().take();
        if let Some(router) = router {
            router.abort();
        }
        self.simulator.stop_simulation();
        self.dispatcher.engine().stop_all_actions().await;

        self.device.set_keep_awake(false);
        self.device.set_status_bar_hidden(false);

        tracing::info!("Show exited");
        self.events().emit(SessionEvent::ShowExited);
    }

    /// Answer "yes" to the exit prompt.
    pub async fn confirm_exit(&self) {
        self.exit_gesture.close_prompt();
        self.exit_show().await;
    }

    /// Answer "no" to the exit prompt.
    pub fn cancel_exit(&self) {
        self.exit_gesture.cancel();
    }
}

/// Forward beacon cue ids to the dispatcher. Each cue runs in its own task so
/// a long cue never delays the next trigger.
async fn route_beacon_cues(
    dispatcher: Arc<CueDispatcher>,
    playlist: Arc<Playlist>,
    mut cues: mpsc::Receiver<CueId>,
) {
    while let Some(cue_id) = cues.recv().await {
        if let Some(cue) = dispatcher.prepare(&playlist, &cue_id) {
            tokio::spawn(cue.run());
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::beacon::decoder::ManufacturerData;
    use crate::beacon::listener::{Advertisement, AdvertisementScanner, ChannelScanner};
    use crate::engine::console::ConsoleOutput;
    use crate::engine::ActionEngine;
    use crate::playlist::fetch::PlaylistFetcher;
    use crate::playlist::integrity::{self, IntegrityMode};
    use crate::playlist::model::{Cue, CueAction};
    use crate::playlist::store::{KeyValueStore, MemoryStore};
    use async_trait::async_trait;
    use uuid::Uuid;

    const SHOW_UUID: &str = "e2c56db5-dffb-48d2-b060-d0f5a71096e0";

    struct NoFetch;

    #[async_trait]
    impl PlaylistFetcher for NoFetch {
        async fn fetch(&self, locator: &str) -> Result<String> {
            Err(crate::error::Error::transport(format!("offline: {locator}")))
        }
    }

    #[derive(Default)]
    struct RecordingDevice {
        calls: parking_lot::Mutex<Vec<(&'static str, bool)>>,
    }

    impl DeviceControls for RecordingDevice {
        fn set_keep_awake(&self, enabled: bool) {
            self.calls.lock().push(("keep_awake", enabled));
        }

        fn set_status_bar_hidden(&self, hidden: bool) {
            self.calls.lock().push(("status_bar_hidden", hidden));
        }
    }

    struct Harness {
        session: ShowSession,
        output: ConsoleOutput,
        device: Arc<RecordingDevice>,
        scanner: Arc<ChannelScanner>,
    }

    async fn harness(cue_source: CueSourceMode) -> Harness {
        let output = ConsoleOutput::new();
        let device = Arc::new(RecordingDevice::default());
        let scanner = Arc::new(ChannelScanner::new());
        let playlists = PlaylistService::new(
            Arc::new(NoFetch),
            Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>,
            IntegrityMode::Enforce,
        );

        let mut playlist = Playlist {
            playlist_id: PlaylistId::from("hamlet-20240301"),
            theater_name: "Stadsteatern".into(),
            show_name: "Hamlet".into(),
            version: "1.0.0".into(),
            ble_uuid: SHOW_UUID.into(),
            checksum: String::new(),
            cues: vec![
                Cue { id: CueId::from("1.1"), actions: vec![CueAction::tts("Ridån går upp")] },
                Cue { id: CueId::from("2.1"), actions: vec![CueAction::tts("Slottet")] },
            ],
            media_files: vec![],
            created_at: String::new(),
        };
        integrity::sign(&mut playlist);
        playlists.save_playlist(&playlist).await.unwrap();

        let session = ShowSession::new(SessionParts {
            playlists,
            dispatcher: Arc::new(CueDispatcher::new(
                Arc::new(ActionEngine::with_console(&output)),
                EventBus::default(),
            )),
            listener: Arc::new(BeaconListener::new(
                Arc::clone(&scanner) as Arc<dyn AdvertisementScanner>
            )),
            device: Arc::clone(&device) as Arc<dyn DeviceControls>,
            cue_source,
        });
        Harness { session, output, device, scanner }
    }

    fn frame(major: u16, minor: u16) -> Advertisement {
        let mut bytes = vec![0x4c, 0x00, 0x02, 0x15];
        bytes.extend_from_slice(Uuid::parse_str(SHOW_UUID).unwrap().as_bytes());
        bytes.extend_from_slice(&major.to_be_bytes());
        bytes.extend_from_slice(&minor.to_be_bytes());
        Advertisement::new(ManufacturerData::Raw(bytes))
    }

    #[tokio::test]
    async fn start_and_exit_reverse_device_state() {
        let h = harness(CueSourceMode::Simulator).await;
        h.session.start_show(&PlaylistId::from("hamlet-20240301")).await.unwrap();
        assert!(matches!(h.session.state(), SessionState::Active { .. }));
        assert!(h.session.simulator().status().is_running);

        h.session.exit_show().await;
        h.session.exit_show().await;

        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(!h.session.simulator().status().is_running);
        assert_eq!(
            *h.device.calls.lock(),
            vec![
                ("keep_awake", true),
                ("status_bar_hidden", true),
                ("keep_awake", false),
                ("status_bar_hidden", false),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_playlist_is_a_no_op() {
        let h = harness(CueSourceMode::Simulator).await;
        h.session.start_show(&PlaylistId::from("missing")).await.unwrap();
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.device.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn manual_trigger_in_simulator_mode() {
        let h = harness(CueSourceMode::Simulator).await;
        assert!(h.session.trigger_cue(&CueId::from("1.1")).await.is_none());

        h.session.start_show(&PlaylistId::from("hamlet-20240301")).await.unwrap();
        let report = h.session.trigger_cue(&CueId::from("2.1")).await.unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(h.output.spoken(), vec!["Slottet"]);
    }

    #[tokio::test]
    async fn trigger_resolved_before_exit_never_plays() {
        let h = harness(CueSourceMode::Simulator).await;
        h.session.start_show(&PlaylistId::from("hamlet-20240301")).await.unwrap();

        let pending = h.session.trigger_cue(&CueId::from("1.1"));
        h.session.exit_show().await;

        let report = pending.await.unwrap();
        assert!(report.cancelled);
        assert!(h.output.spoken().is_empty());
    }

    #[tokio::test]
    async fn beacon_mode_routes_cues_until_exit() {
        let h = harness(CueSourceMode::Beacon).await;
        let mut events = h.session.events().subscribe();
        h.session.start_show(&PlaylistId::from("hamlet-20240301")).await.unwrap();
        assert!(h.scanner.is_scanning());

        assert!(h.scanner.inject(frame(1, 1)).await);
        loop {
            if let SessionEvent::CueTriggered { cue_id, .. } = events.recv().await.unwrap() {
                assert_eq!(cue_id, CueId::from("1.1"));
                break;
            }
        }

        h.session.exit_show().await;
        assert!(!h.scanner.is_scanning());
        assert!(!h.scanner.inject(frame(2, 1)).await);
    }

    #[tokio::test]
    async fn load_failure_leaves_session_untouched() {
        let h = harness(CueSourceMode::Simulator).await;
        let err = h.session.load_playlist("https://cues.example/x").await.unwrap_err();
        assert!(err.is_load_failure());
        assert!(h.session.current_playlist().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn exit_prompt_flow() {
        let h = harness(CueSourceMode::Simulator).await;
        h.session.start_show(&PlaylistId::from("hamlet-20240301")).await.unwrap();

        h.session.exit_gesture().press();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(h.session.exit_gesture().is_prompt_open());

        h.session.cancel_exit();
        assert!(!h.session.exit_gesture().is_prompt_open());
        assert!(matches!(h.session.state(), SessionState::Active { .. }));

        h.session.exit_gesture().press();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        h.session.confirm_exit().await;
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(!h.session.exit_gesture().is_prompt_open());
    }
}
