//! Input handling abstractions.
//!
//! This module provides traits and types for handling keyboard input
//! in a modular way, allowing mode-specific handlers to be tested independently.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::AppMode;

/// An operation requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move the selection up.
    Up,
    /// Move the selection down.
    Down,
    /// Start the show for the selected playlist.
    StartShow,
    /// Reload the playlist library.
    Refresh,
    /// Begin typing a playlist locator.
    OpenLocator,
    /// Delete the selected playlist.
    DeletePlaylist,
    /// Fire the selected cue.
    TriggerCue,
    /// Start or stop auto-playback.
    ToggleAutoPlayback,
    /// Halt every in-flight action.
    EmergencyStop,
    /// Exit control held (or repeating).
    HoldExit,
    /// Exit prompt answered "yes".
    ConfirmExit,
    /// Exit prompt answered "no".
    CancelExit,
    /// Dismiss the message overlay.
    DismissMessage,
}

/// Result of processing an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResult {
    /// The input was consumed without effect.
    Consumed,
    /// The input was ignored (not applicable to this handler).
    Ignored,
    /// The application should quit.
    Quit,
    /// Run a command.
    Command(Command),
}

/// Context passed to input handlers.
#[derive(Debug, Clone, Copy)]
pub struct InputContext {
    /// Current application mode.
    pub mode: AppMode,
    /// Whether the exit prompt is showing.
    pub exit_prompt_open: bool,
    /// Whether a message overlay is showing.
    pub has_message: bool,
}

/// Trait for handling keyboard input.
///
/// Implementations of this trait handle input for specific modes
/// or input contexts.
pub trait InputHandler {
    /// Handle a key event.
    fn handle(&mut self, key: KeyEvent, ctx: &InputContext) -> InputResult;

    /// Get the name of this handler (for debugging).
    fn name(&self) -> &'static str;
}

/// Handler for keys that work everywhere.
#[derive(Debug, Default)]
pub struct GlobalHandler;

impl InputHandler for GlobalHandler {
    fn handle(&mut self, key: KeyEvent, ctx: &InputContext) -> InputResult {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return InputResult::Quit;
        }
        if ctx.has_message {
            return match key.code {
                KeyCode::Esc | KeyCode::Enter => InputResult::Command(Command::DismissMessage),
                _ => InputResult::Consumed,
            };
        }
        InputResult::Ignored
    }

    fn name(&self) -> &'static str {
        "GlobalHandler"
    }
}

/// Handler for the exit prompt; swallows everything else while open.
#[derive(Debug, Default)]
pub struct ExitPromptHandler;

impl InputHandler for ExitPromptHandler {
    fn handle(&mut self, key: KeyEvent, ctx: &InputContext) -> InputResult {
        if !ctx.exit_prompt_open {
            return InputResult::Ignored;
        }
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => InputResult::Command(Command::ConfirmExit),
            KeyCode::Char('n') | KeyCode::Esc => InputResult::Command(Command::CancelExit),
            _ => InputResult::Consumed,
        }
    }

    fn name(&self) -> &'static str {
        "ExitPromptHandler"
    }
}

/// Handler for the playlist library.
#[derive(Debug, Default)]
pub struct LibraryHandler;

impl InputHandler for LibraryHandler {
    fn handle(&mut self, key: KeyEvent, ctx: &InputContext) -> InputResult {
        if ctx.mode != AppMode::Library {
            return InputResult::Ignored;
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => InputResult::Command(Command::Up),
            KeyCode::Down | KeyCode::Char('j') => InputResult::Command(Command::Down),
            KeyCode::Enter => InputResult::Command(Command::StartShow),
            KeyCode::Char('r') => InputResult::Command(Command::Refresh),
            KeyCode::Char('o') => InputResult::Command(Command::OpenLocator),
            KeyCode::Char('d') => InputResult::Command(Command::DeletePlaylist),
            KeyCode::Char('q') => InputResult::Quit,
            _ => InputResult::Ignored,
        }
    }

    fn name(&self) -> &'static str {
        "LibraryHandler"
    }
}

/// Handler for a running show.
#[derive(Debug, Default)]
pub struct ShowHandler;

impl InputHandler for ShowHandler {
    fn handle(&mut self, key: KeyEvent, ctx: &InputContext) -> InputResult {
        if ctx.mode != AppMode::Show {
            return InputResult::Ignored;
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => InputResult::Command(Command::Up),
            KeyCode::Down | KeyCode::Char('j') => InputResult::Command(Command::Down),
            KeyCode::Enter | KeyCode::Char(' ') => InputResult::Command(Command::TriggerCue),
            KeyCode::Char('a') => InputResult::Command(Command::ToggleAutoPlayback),
            KeyCode::Char('s') => InputResult::Command(Command::EmergencyStop),
            KeyCode::Char('x') => InputResult::Command(Command::HoldExit),
            _ => InputResult::Ignored,
        }
    }

    fn name(&self) -> &'static str {
        "ShowHandler"
    }
}

/// Run `key` through the handlers in priority order.
pub fn route(key: KeyEvent, ctx: &InputContext) -> InputResult {
    let mut handlers: [&mut dyn InputHandler; 4] = [
        &mut GlobalHandler,
        &mut ExitPromptHandler,
        &mut LibraryHandler,
        &mut ShowHandler,
    ];
    for handler in &mut handlers {
        let result = handler.handle(key, ctx);
        if result != InputResult::Ignored {
            tracing::trace!(handler = handler.name(), ?result, "Key handled");
            return result;
        }
    }
    InputResult::Ignored
}
