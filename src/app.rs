//! Terminal show runner state.
//!
//! `App` holds everything the UI draws and turns key presses into session
//! operations. Session calls are async; they run on spawned tasks and report
//! back through `AppUpdate` messages or the session event bus, both drained
//! once per frame in [`App::handle_updates`].

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

use crate::beacon::listener::{AdvertisementScanner, BeaconListener, ChannelScanner, ReplayScanner};
use crate::config::{Config, CueSourceMode};
use crate::constants::async_tasks::CHANNEL_BUFFER_SIZE;
use crate::constants::beacon::REPLAY_GAP_MS;
use crate::constants::ui::HOLD_RELEASE_MS;
use crate::engine::console::ConsoleOutput;
use crate::engine::ActionEngine;
use crate::error::{Error, Result};
use crate::events::{EventBus, SessionEvent};
use crate::input::{self, Command, InputContext, InputResult};
use crate::playlist::fetch::HttpPlaylistFetcher;
use crate::playlist::model::{Playlist, PlaylistMetadata};
use crate::playlist::store::FileStore;
use crate::services::dispatch::CueDispatcher;
use crate::services::playlist::PlaylistService;
use crate::session::{HeadlessDevice, SessionParts, SessionState, ShowSession};
use crate::types::{CueId, SceneNumber};

/// Results of async tasks spawned by the app.
#[derive(Debug)]
pub enum AppUpdate {
    /// Library listing finished.
    PlaylistsListed(Result<Vec<PlaylistMetadata>>),
    /// A locator load finished.
    PlaylistLoaded(Result<Arc<Playlist>>),
    /// A show start finished.
    ShowStarted(Result<()>),
    /// A deletion finished.
    PlaylistDeleted(Result<()>),
}

/// Which screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Stored playlists.
    Library,
    /// Running show.
    Show,
}

/// One line of the cue list.
#[derive(Debug, Clone, PartialEq)]
pub struct CueRow {
    /// Scene the cue belongs to.
    pub scene: SceneNumber,
    /// Cue id.
    pub cue_id: CueId,
    /// Short description of the cue's first action.
    pub summary: String,
}

/// Show runner state.
pub struct App {
    /// Current screen.
    pub mode: AppMode,
    /// Loaded configuration.
    pub config: Config,
    session: Arc<ShowSession>,
    /// Stage output the engine writes to.
    pub output: ConsoleOutput,
    /// Stored playlists, newest first.
    pub playlists: Vec<PlaylistMetadata>,
    /// Library selection.
    pub library_state: ListState,
    /// Cues of the running show, by scene.
    pub cue_rows: Vec<CueRow>,
    /// Cue selection.
    pub cue_state: ListState,
    /// Most recently triggered cue.
    pub last_cue: Option<CueId>,
    /// Exit gesture progress, 0..=100.
    pub exit_progress: u8,
    /// Whether auto-playback is running.
    pub auto_playback: bool,
    /// Whether a load is in progress.
    pub is_loading: bool,
    /// Non-blocking status line.
    pub notice: Option<String>,
    /// Blocking error overlay.
    pub error_message: Option<String>,
    /// Locator being typed, if the prompt is open.
    pub locator_input: Option<String>,
    exit_held_at: Option<Instant>,
    events: broadcast::Receiver<SessionEvent>,
    async_task_tx: mpsc::Sender<AppUpdate>,
    async_task_rx: mpsc::Receiver<AppUpdate>,
    should_quit: bool,
}

impl App {
    /// Assemble the session from configuration.
    pub fn from_config(config: Config) -> Self {
        let mut output = ConsoleOutput::new();
        let media_root = config.data_dir.join("media");
        if media_root.is_dir() {
            output = output.with_media_root(media_root);
        }

        let scanner: Arc<dyn AdvertisementScanner> = match &config.beacon_replay {
            Some(path) => Arc::new(ReplayScanner::new(path, Duration::from_millis(REPLAY_GAP_MS))),
            None => Arc::new(ChannelScanner::new()),
        };

        let playlists = PlaylistService::new(
            Arc::new(HttpPlaylistFetcher::new(&config)),
            Arc::new(FileStore::new(config.data_dir.join("store"))),
            config.integrity,
        );
        let session = ShowSession::new(SessionParts {
            playlists,
            dispatcher: Arc::new(CueDispatcher::new(
                Arc::new(ActionEngine::with_console(&output)),
                EventBus::default(),
            )),
            listener: Arc::new(BeaconListener::new(scanner)),
            device: Arc::new(HeadlessDevice),
            cue_source: config.cue_source,
        });

        Self::new(config, Arc::new(session), output)
    }

    /// Create the app over an assembled session and the console it writes to.
    pub fn new(config: Config, session: Arc<ShowSession>, output: ConsoleOutput) -> Self {
        let (async_task_tx, async_task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let events = session.events().subscribe();
        let app = Self {
            mode: AppMode::Library,
            config,
            session,
            output,
            playlists: Vec::new(),
            library_state: ListState::default(),
            cue_rows: Vec::new(),
            cue_state: ListState::default(),
            last_cue: None,
            exit_progress: 0,
            auto_playback: false,
            is_loading: false,
            notice: None,
            error_message: None,
            locator_input: None,
            exit_held_at: None,
            events,
            async_task_tx,
            async_task_rx,
            should_quit: false,
        };
        app.refresh_playlists();
        app
    }

    /// The session driven by this app.
    pub fn session(&self) -> &ShowSession {
        &self.session
    }

    /// Whether the main loop should end.
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Whether the exit prompt is showing.
    pub fn exit_prompt_open(&self) -> bool {
        self.session.exit_gesture().is_prompt_open()
    }

    /// Load a playlist from a locator, as a deep link would.
    pub fn load_locator(&mut self, locator: String) {
        self.is_loading = true;
        let session = Arc::clone(&self.session);
        let tx = self.async_task_tx.clone();
        tokio::spawn(async move {
            let result = session.load_playlist(&locator).await;
            let _ = tx.send(AppUpdate::PlaylistLoaded(result)).await;
        });
    }

    /// Process one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.locator_input.is_some() {
            self.handle_locator_key(key);
            return;
        }

        let ctx = InputContext {
            mode: self.mode,
            exit_prompt_open: self.exit_prompt_open(),
            has_message: self.error_message.is_some(),
        };
        match input::route(key, &ctx) {
            InputResult::Quit => self.quit(),
            InputResult::Command(command) => self.run_command(command),
            InputResult::Consumed | InputResult::Ignored => {}
        }
    }

    fn handle_locator_key(&mut self, key: KeyEvent) {
        let Some(buffer) = self.locator_input.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Enter => {
                let locator = buffer.trim().to_string();
                self.locator_input = None;
                if !locator.is_empty() {
                    self.load_locator(locator);
                }
            }
            KeyCode::Esc => self.locator_input = None,
            _ => {}
        }
    }

    fn run_command(&mut self, command: Command) {
        match command {
            Command::Up => self.move_selection(-1),
            Command::Down => self.move_selection(1),
            Command::StartShow => self.start_selected_show(),
            Command::Refresh => self.refresh_playlists(),
            Command::OpenLocator => self.locator_input = Some(String::new()),
            Command::DeletePlaylist => self.delete_selected_playlist(),
            Command::TriggerCue => self.trigger_selected_cue(),
            Command::ToggleAutoPlayback => self.toggle_auto_playback(),
            Command::EmergencyStop => {
                let session = Arc::clone(&self.session);
                tokio::spawn(async move { session.emergency_stop().await });
            }
            Command::HoldExit => {
                self.exit_held_at = Some(Instant::now());
                self.session.exit_gesture().press();
            }
            Command::ConfirmExit => {
                let session = Arc::clone(&self.session);
                tokio::spawn(async move { session.confirm_exit().await });
            }
            Command::CancelExit => self.session.cancel_exit(),
            Command::DismissMessage => self.error_message = None,
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let (state, len) = match self.mode {
            AppMode::Library => (&mut self.library_state, self.playlists.len()),
            AppMode::Show => (&mut self.cue_state, self.cue_rows.len()),
        };
        if len == 0 {
            state.select(None);
            return;
        }
        let current = state.selected().unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(len - 1);
        state.select(Some(next));
    }

    fn refresh_playlists(&self) {
        let session = Arc::clone(&self.session);
        let tx = self.async_task_tx.clone();
        tokio::spawn(async move {
            let result = session.playlists().list_playlists().await;
            let _ = tx.send(AppUpdate::PlaylistsListed(result)).await;
        });
    }

    fn start_selected_show(&mut self) {
        let Some(entry) = self.library_state.selected().and_then(|i| self.playlists.get(i)) else {
            return;
        };
        let playlist_id = entry.playlist_id.clone();
        self.is_loading = true;
        let session = Arc::clone(&self.session);
        let tx = self.async_task_tx.clone();
        tokio::spawn(async move {
            let result = session.start_show(&playlist_id).await;
            let _ = tx.send(AppUpdate::ShowStarted(result)).await;
        });
    }

    fn delete_selected_playlist(&mut self) {
        let Some(entry) = self.library_state.selected().and_then(|i| self.playlists.get(i)) else {
            return;
        };
        let playlist_id = entry.playlist_id.clone();
        let session = Arc::clone(&self.session);
        let tx = self.async_task_tx.clone();
        tokio::spawn(async move {
            let result = session.playlists().delete_playlist(&playlist_id).await;
            let _ = tx.send(AppUpdate::PlaylistDeleted(result)).await;
        });
    }

    fn trigger_selected_cue(&self) {
        let Some(row) = self.cue_state.selected().and_then(|i| self.cue_rows.get(i)) else {
            return;
        };
        // Resolved here so an emergency stop pressed next still catches it
        tokio::spawn(self.session.trigger_cue(&row.cue_id));
    }

    fn toggle_auto_playback(&mut self) {
        if self.config.cue_source != CueSourceMode::Simulator {
            self.notice = Some("Auto-playback is only available with the simulator".to_string());
            return;
        }
        if self.auto_playback {
            self.session.simulator().stop_auto_playback();
        } else {
            self.session.start_auto_playback(Duration::from_millis(self.config.auto_interval_ms));
        }
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Drain async results and session events; release a stale exit hold.
    pub fn handle_updates(&mut self) {
        while let Ok(update) = self.async_task_rx.try_recv() {
            self.apply_update(update);
        }

        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Runner lagged behind session events");
                }
                Err(_) => break,
            }
        }

        if self
            .exit_held_at
            .is_some_and(|at| at.elapsed() >= Duration::from_millis(HOLD_RELEASE_MS))
        {
            self.exit_held_at = None;
            self.session.exit_gesture().release();
        }
    }

    fn apply_update(&mut self, update: AppUpdate) {
        match update {
            AppUpdate::PlaylistsListed(result) => match result {
                Ok(playlists) => {
                    self.playlists = playlists;
                    let selected = self.library_state.selected().unwrap_or(0);
                    let last = self.playlists.len().checked_sub(1);
                    self.library_state.select(last.map(|last| selected.min(last)));
                }
                Err(e) => self.show_error(&e),
            },
            AppUpdate::PlaylistLoaded(result) => {
                self.is_loading = false;
                match result {
                    Ok(playlist) => {
                        self.notice = Some(format!("Loaded '{}'", playlist.show_name));
                        self.refresh_playlists();
                    }
                    Err(e) => self.show_error(&e),
                }
            }
            AppUpdate::ShowStarted(result) => {
                self.is_loading = false;
                if let Err(e) = result {
                    self.show_error(&e);
                }
            }
            AppUpdate::PlaylistDeleted(result) => match result {
                Ok(()) => self.refresh_playlists(),
                Err(e) => self.show_error(&e),
            },
        }
    }

    fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ShowStarted { .. } => self.enter_show(),
            SessionEvent::ShowExited => {
                self.mode = AppMode::Library;
                self.cue_rows.clear();
                self.cue_state.select(None);
                self.auto_playback = false;
                self.exit_progress = 0;
                self.exit_held_at = None;
                self.refresh_playlists();
            }
            SessionEvent::CueTriggered { cue_id, .. } => self.last_cue = Some(cue_id),
            SessionEvent::AutoPlaybackStarted { .. } => self.auto_playback = true,
            SessionEvent::AutoPlaybackStopped => self.auto_playback = false,
            SessionEvent::EmergencyStop => self.notice = Some("Emergency stop".to_string()),
            SessionEvent::ExitProgress(progress) => self.exit_progress = progress,
            SessionEvent::ExitConfirmationRequested => self.exit_held_at = None,
            SessionEvent::SimulatorStarted { .. } | SessionEvent::SimulatorStopped => {}
        }
    }

    fn enter_show(&mut self) {
        let SessionState::Active { playlist, .. } = self.session.state() else {
            return;
        };
        self.cue_rows = playlist
            .scenes()
            .into_iter()
            .flat_map(|scene| {
                let number = scene.number;
                scene.cues.into_iter().map(move |cue| CueRow {
                    scene: number.clone(),
                    summary: summarize(&cue.actions),
                    cue_id: cue.id,
                })
            })
            .collect();
        self.cue_state.select((!self.cue_rows.is_empty()).then_some(0));
        self.last_cue = None;
        self.notice = None;
        self.mode = AppMode::Show;
    }

    fn show_error(&mut self, error: &Error) {
        tracing::warn!(error = %error, "Operation failed");
        self.error_message = Some(error.user_message());
    }
}

fn summarize(actions: &[crate::playlist::model::CueAction]) -> String {
    let Some(first) = actions.first() else {
        return "(no actions)".to_string();
    };
    let detail = first.text.as_deref().or(first.file.as_deref()).unwrap_or_default();
    let more = if actions.len() > 1 { format!(" (+{})", actions.len() - 1) } else { String::new() };
    format!("{}: {detail}{more}", first.kind)
}
