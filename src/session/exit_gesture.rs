//! Long-press exit gesture.
//!
//! Holding the exit control accumulates progress in fixed steps on a fixed
//! tick. Releasing early resets it with no effect; reaching
//! [`COMPLETE`](crate::constants::exit_gesture::COMPLETE) opens the exit prompt
//! and resets progress. While the prompt is open new presses are ignored.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::constants::exit_gesture::{COMPLETE, STEP, TICK_MS};
use crate::events::{EventBus, SessionEvent};

/// Progress accumulator, independent of any timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitProgress(u8);

impl ExitProgress {
    /// Current progress, 0..=100.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Advance one tick. Returns `true` when the gesture completes.
    pub fn tick(&mut self) -> bool {
        self.0 = self.0.saturating_add(STEP).min(COMPLETE);
        self.0 >= COMPLETE
    }

    /// Back to zero.
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

#[derive(Default)]
struct State {
    progress: ExitProgress,
    prompt_open: bool,
    timer: Option<JoinHandle<()>>,
}

/// Timer-driven exit gesture.
#[derive(Clone)]
pub struct ExitGesture {
    events: EventBus,
    state: Arc<Mutex<State>>,
}

impl ExitGesture {
    /// Create an idle gesture reporting on `events`.
    pub fn new(events: EventBus) -> Self {
        Self { events, state: Arc::new(Mutex::new(State::default())) }
    }

    /// Current progress.
    pub fn progress(&self) -> u8 {
        self.state.lock().progress.value()
    }

    /// Whether the exit prompt is showing.
    pub fn is_prompt_open(&self) -> bool {
        self.state.lock().prompt_open
    }

    /// Start accumulating. Ignored while already held or while the prompt is open.
    pub fn press(&self) {
        let mut state = self.state.lock();
        if state.prompt_open || state.timer.is_some() {
            return;
        }
        state.progress.reset();

        let gesture = self.clone();
        state.timer = Some(tokio::spawn(async move {
            let tick = Duration::from_millis(TICK_MS);
            let mut ticker = interval_at(Instant::now() + tick, tick);
            loop {
                ticker.tick().await;
                if gesture.advance() {
                    break;
                }
            }
        }));
    }

    fn advance(&self) -> bool {
        let (progress, completed) = {
            let mut state = self.state.lock();
            let completed = state.progress.tick();
            let progress = state.progress.value();
            if completed {
                state.progress.reset();
                state.prompt_open = true;
                state.timer = None;
            }
            (progress, completed)
        };

        self.events.emit(SessionEvent::ExitProgress(progress));
        if completed {
            tracing::info!("Exit gesture completed");
            self.events.emit(SessionEvent::ExitConfirmationRequested);
            self.events.emit(SessionEvent::ExitProgress(0));
        }
        completed
    }

    /// Stop accumulating and reset progress without effect.
    pub fn release(&self) {
        let (timer, had_progress) = {
            let mut state = self.state.lock();
            let had_progress = state.progress.value() > 0;
            state.progress.reset();
            (state.timer.take(), had_progress)
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        if had_progress {
            self.events.emit(SessionEvent::ExitProgress(0));
        }
    }

    /// Close the exit prompt.
    pub fn close_prompt(&self) {
        self.state.lock().prompt_open = false;
    }

    /// Release and close the prompt.
    pub fn cancel(&self) {
        self.release();
        self.close_prompt();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;

    fn ticks(n: u64) -> Duration {
        Duration::from_millis(n * TICK_MS + TICK_MS / 2)
    }

    #[test]
    fn accumulator_completes_on_tick_34() {
        let mut progress = ExitProgress::default();
        for _ in 0..33 {
            assert!(!progress.tick());
        }
        assert_eq!(progress.value(), 99);
        assert!(progress.tick());
        assert_eq!(progress.value(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn holding_opens_prompt() {
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let gesture = ExitGesture::new(events);

        gesture.press();
        tokio::time::sleep(ticks(34)).await;

        assert!(gesture.is_prompt_open());
        assert_eq!(gesture.progress(), 0);

        let mut requested = false;
        while let Ok(event) = rx.try_recv() {
            requested |= event == SessionEvent::ExitConfirmationRequested;
        }
        assert!(requested);
    }

    #[tokio::test(start_paused = true)]
    async fn early_release_resets_without_prompt() {
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let gesture = ExitGesture::new(events);

        gesture.press();
        tokio::time::sleep(ticks(10)).await;
        assert_eq!(gesture.progress(), 30);

        gesture.release();
        assert_eq!(gesture.progress(), 0);
        tokio::time::sleep(ticks(40)).await;
        assert_eq!(gesture.progress(), 0);
        assert!(!gesture.is_prompt_open());

        while let Ok(event) = rx.try_recv() {
            assert_ne!(event, SessionEvent::ExitConfirmationRequested);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn press_ignored_while_prompt_open() {
        let gesture = ExitGesture::new(EventBus::default());
        gesture.press();
        tokio::time::sleep(ticks(34)).await;
        assert!(gesture.is_prompt_open());

        gesture.press();
        tokio::time::sleep(ticks(5)).await;
        assert_eq!(gesture.progress(), 0);

        gesture.cancel();
        assert!(!gesture.is_prompt_open());
        gesture.press();
        tokio::time::sleep(ticks(5)).await;
        assert_eq!(gesture.progress(), 15);
        gesture.release();
    }
}
