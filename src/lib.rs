//! `theater-cue` - accessibility cue playback for live theater.
//!
//! Downloads a show's signed playlist, verifies its integrity, receives cue
//! triggers from in-venue beacons or a rehearsal simulator, and executes each
//! cue's narration, audio, video and subtitle actions.

// Re-export public modules for use in integration tests and as a library
pub mod app;
pub mod beacon;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod input;
pub mod playlist;
pub mod services;
pub mod session;
pub mod types;
pub mod ui;
