//! Service modules coordinating playlists, cue sources and the engine.
//!
//! Each service wraps one step of the show pipeline so the session and the
//! runner can be tested against them independently.

pub mod dispatch;
pub mod playlist;
pub mod simulator;

pub use dispatch::{CueDispatcher, PendingCue};
pub use playlist::PlaylistService;
pub use simulator::{CueSimulator, SimulatorStatus};
