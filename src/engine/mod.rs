//! Action execution engine.
//!
//! Turns a cue's action list into stage output. Actions of one cue run
//! strictly in order, each after its own delay. Cues triggered while another
//! cue is still running execute concurrently; narration stays single-stream
//! because every `tts` action stops the current utterance first.
//!
//! [`ActionEngine::stop_all_actions`] cancels pending delays of every
//! in-flight cue, stops speech, and stops and releases every tracked
//! playback handle. A cue belongs to the stop generation that was current
//! when it was triggered ([`ActionEngine::stop_token`]), so a cue handed to a
//! task just before a stop is cancelled too, even if the task starts late.
//!
//! At most one playback per media file is tracked: replaying a clip stops
//! and releases the previous playback of it, and handles that report
//! [`PlaybackHandle::is_finished`] are released when the next clip starts.

/// Recording console implementation of the output collaborators
pub mod console;
/// Output collaborator traits
pub mod output;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::constants::{media, speech};
use crate::error::{Error, Result};
use crate::playlist::model::{ActionKind, CueAction};
use crate::types::CueId;
use output::{
    MediaKind, MediaPlayer, MessageDisplay, MessageKind, PlaybackHandle, PlaybackRequest,
    SpeechRequest, SpeechSynthesizer,
};

/// Summary of one `execute_actions` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Actions that produced output.
    pub executed: usize,
    /// Actions skipped (unknown type, missing text or file).
    pub skipped: usize,
    /// Actions whose output collaborator failed.
    pub failed: usize,
    /// Whether the cue was cut short by `stop_all_actions`.
    pub cancelled: bool,
}

enum Outcome {
    Executed,
    Skipped,
    Cancelled,
}

/// Executes cue actions against the platform output collaborators.
pub struct ActionEngine {
    speech: Arc<dyn SpeechSynthesizer>,
    media: Arc<dyn MediaPlayer>,
    display: Arc<dyn MessageDisplay>,
    handles: Mutex<HashMap<String, Box<dyn PlaybackHandle>>>,
    cancel: Mutex<CancellationToken>,
}

impl ActionEngine {
    /// Engine over the given collaborators.
    pub fn new(
        speech: Arc<dyn SpeechSynthesizer>,
        media: Arc<dyn MediaPlayer>,
        display: Arc<dyn MessageDisplay>,
    ) -> Self {
        Self {
            speech,
            media,
            display,
            handles: Mutex::new(HashMap::new()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Engine whose every collaborator is one console output.
    pub fn with_console(output: &console::ConsoleOutput) -> Self {
        Self::new(
            Arc::new(output.clone()),
            Arc::new(output.clone()),
            Arc::new(output.clone()),
        )
    }

    /// Number of playback handles currently tracked.
    pub fn tracked_handles(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether narration is in progress.
    pub async fn is_speaking(&self) -> bool {
        self.speech.is_speaking().await
    }

    /// Token of the current stop generation. It is cancelled by the next
    /// [`ActionEngine::stop_all_actions`].
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Execute `actions` in order under the current stop generation.
    pub async fn execute_actions(&self, actions: &[CueAction], cue_id: &CueId) -> ExecutionReport {
        let token = self.stop_token();
        self.execute_actions_until(actions, cue_id, &token).await
    }

    /// Execute `actions` in order until `token` is cancelled. Never fails:
    /// per-action errors are logged and counted, and the remaining actions
    /// still run.
    pub async fn execute_actions_until(
        &self,
        actions: &[CueAction],
        cue_id: &CueId,
        token: &CancellationToken,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        tracing::info!(%cue_id, count = actions.len(), "Executing cue actions");

        for action in actions {
            let delay = action.delay();
            if !delay.is_zero() {
                tracing::debug!(
                    %cue_id,
                    kind = %action.kind,
                    delay_ms = delay.as_millis(),
                    "Waiting before action"
                );
            }
            if !wait(token, delay).await {
                report.cancelled = true;
                break;
            }

            match self.execute_action(action, cue_id, token).await {
                Ok(Outcome::Executed) => report.executed += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Ok(Outcome::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(%cue_id, kind = %action.kind, error = %e, "Action failed");
                    report.failed += 1;
                }
            }
        }

        if report.cancelled {
            tracing::info!(%cue_id, "Cue cancelled");
        }
        report
    }

    async fn execute_action(
        &self,
        action: &CueAction,
        cue_id: &CueId,
        token: &CancellationToken,
    ) -> Result<Outcome> {
        match &action.kind {
            ActionKind::Tts => self.speak(action, token).await,
            ActionKind::Audio => self.play(MediaKind::Audio, action, token).await,
            ActionKind::Video => self.play(MediaKind::Video, action, token).await,
            ActionKind::Text => self.show(MessageKind::Text, action),
            ActionKind::Subtitle => self.show(MessageKind::Subtitle, action),
            ActionKind::Unknown(raw) => {
                tracing::warn!(%cue_id, kind = %raw, "Unknown action type, skipping");
                Ok(Outcome::Skipped)
            }
        }
    }

    async fn speak(&self, action: &CueAction, token: &CancellationToken) -> Result<Outcome> {
        let Some(text) = action.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            tracing::warn!("TTS action missing text");
            return Ok(Outcome::Skipped);
        };

        if self.speech.is_speaking().await {
            self.speech.stop().await?;
            if !wait(token, Duration::from_millis(speech::SETTLE_MS)).await {
                return Ok(Outcome::Cancelled);
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let request = SpeechRequest {
            text: text.to_string(),
            language: action
                .language
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| speech::DEFAULT_LANGUAGE.to_string()),
            rate: action.rate.map_or(speech::RATE, |r| r as f32),
            pitch: action.pitch.map_or(speech::PITCH, |p| p as f32),
        };
        self.speech.speak(request).await?;

        // A stop that landed while the utterance was starting missed it.
        if token.is_cancelled() {
            self.speech.stop().await?;
            return Ok(Outcome::Cancelled);
        }
        Ok(Outcome::Executed)
    }

    async fn play(
        &self,
        kind: MediaKind,
        action: &CueAction,
        token: &CancellationToken,
    ) -> Result<Outcome> {
        let Some(file) = action.file.as_deref().filter(|f| !f.is_empty()) else {
            tracing::warn!(%kind, "Media action missing file");
            return Ok(Outcome::Skipped);
        };

        let volume = action.volume.unwrap_or(media::DEFAULT_VOLUME);
        if !(0.0..=1.0).contains(&volume) {
            return Err(Error::action(kind.to_string(), format!("volume {volume} out of range")));
        }

        let mut handle = self
            .media
            .play(PlaybackRequest { kind, file: file.to_string(), volume })
            .await?;

        // An emergency stop may have landed while the player was starting.
        if token.is_cancelled() {
            release(file, handle.as_mut()).await;
            return Ok(Outcome::Cancelled);
        }

        let key = format!("{kind}:{file}");
        let stale = {
            let mut handles = self.handles.lock();
            let mut stale: Vec<String> =
                handles.iter().filter(|(_, h)| h.is_finished()).map(|(k, _)| k.clone()).collect();
            if handles.contains_key(&key) && !stale.contains(&key) {
                stale.push(key.clone());
            }
            let stale: Vec<_> =
                stale.into_iter().filter_map(|k| handles.remove(&k).map(|h| (k, h))).collect();
            handles.insert(key, handle);
            stale
        };
        release_all(stale).await;
        Ok(Outcome::Executed)
    }

    fn show(&self, kind: MessageKind, action: &CueAction) -> Result<Outcome> {
        let Some(text) = action.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            tracing::warn!(?kind, "Message action missing text");
            return Ok(Outcome::Skipped);
        };
        self.display.show(kind, text)?;
        Ok(Outcome::Executed)
    }

    /// Halt everything: pending delays, speech, and every tracked playback.
    /// Safe with nothing in flight.
    pub async fn stop_all_actions(&self) {
        tracing::info!("Stopping all actions");

        let previous = std::mem::replace(&mut *self.cancel.lock(), CancellationToken::new());
        previous.cancel();

        if let Err(e) = self.speech.stop().await {
            tracing::warn!(error = %e, "Failed to stop speech");
        }

        let handles: Vec<(String, Box<dyn PlaybackHandle>)> = self.handles.lock().drain().collect();
        release_all(handles).await;
    }
}

/// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
async fn wait(token: &CancellationToken, delay: Duration) -> bool {
    if token.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

async fn release_all(handles: Vec<(String, Box<dyn PlaybackHandle>)>) {
    futures::future::join_all(
        handles
            .into_iter()
            .map(|(key, mut handle)| async move { release(&key, handle.as_mut()).await }),
    )
    .await;
}

async fn release(key: &str, handle: &mut dyn PlaybackHandle) {
    if let Err(e) = handle.stop().await {
        tracing::warn!(key, error = %e, "Failed to stop playback");
    }
    if let Err(e) = handle.unload().await {
        tracing::warn!(key, error = %e, "Failed to release playback");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::console::{ConsoleOutput, StageOutput};
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn engine() -> (Arc<ActionEngine>, ConsoleOutput) {
        let output = ConsoleOutput::new();
        (Arc::new(ActionEngine::with_console(&output)), output)
    }

    fn audio(file: &str) -> CueAction {
        CueAction { file: Some(file.into()), ..CueAction::new(ActionKind::Audio) }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_type_between_tts_is_skipped() {
        let (engine, output) = engine();
        let actions = vec![
            CueAction::tts("A"),
            CueAction::new(ActionKind::from("unknown")),
            CueAction::tts("B"),
        ];

        let report = engine.execute_actions(&actions, &CueId::from("1.1")).await;

        assert_eq!(output.spoken(), vec!["A", "B"]);
        let expected = ExecutionReport { executed: 2, skipped: 1, failed: 0, cancelled: false };
        assert_eq!(report, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn second_utterance_interrupts_first_after_settle() {
        let (engine, output) = engine();
        let actions = vec![CueAction::tts("en lång mening"), CueAction::tts("nästa")];

        let started = tokio::time::Instant::now();
        engine.execute_actions(&actions, &CueId::from("1.1")).await;

        assert_eq!(started.elapsed(), Duration::from_millis(speech::SETTLE_MS));
        assert_eq!(
            output.entries(),
            vec![
                StageOutput::Speech { text: "en lång mening".into(), language: "sv-SE".into() },
                StageOutput::SpeechStopped,
                StageOutput::Speech { text: "nästa".into(), language: "sv-SE".into() },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delays_apply_before_each_action() {
        let (engine, output) = engine();
        let actions = vec![
            CueAction { text: Some("först".into()), ..CueAction::new(ActionKind::Subtitle) }
                .with_delay(1000),
            CueAction { text: Some("sen".into()), ..CueAction::new(ActionKind::Text) }
                .with_delay(500),
        ];

        let run = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.execute_actions(&actions, &CueId::from("2.1")).await }
        });

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(output.entries().is_empty());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(output.entries().len(), 1);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(output.entries().len(), 2);
        assert_eq!(run.await.unwrap().executed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_cancels_pending_delay_and_releases_media() {
        let (engine, output) = engine();
        let actions = vec![audio("storm.mp3"), CueAction::tts("för sent").with_delay(60_000)];

        let run = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.execute_actions(&actions, &CueId::from("3.1")).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.tracked_handles(), 1);

        engine.stop_all_actions().await;
        let report = run.await.unwrap();

        assert!(report.cancelled);
        assert_eq!(engine.tracked_handles(), 0);
        assert!(output.spoken().is_empty());
        let released = StageOutput::PlaybackReleased { file: "storm.mp3".into() };
        assert!(output.entries().contains(&released));

        // The engine keeps working after an emergency stop.
        let report = engine.execute_actions(&[CueAction::tts("igen")], &CueId::from("3.2")).await;
        assert_eq!(report.executed, 1);
    }

    #[tokio::test]
    async fn stop_all_with_nothing_in_flight() {
        let (engine, output) = engine();
        engine.stop_all_actions().await;
        engine.stop_all_actions().await;
        assert!(output.entries().is_empty());
    }

    #[tokio::test]
    async fn failing_action_does_not_abort_cue() {
        let dir = tempfile::tempdir().unwrap();
        let output = ConsoleOutput::new().with_media_root(dir.path());
        let engine = ActionEngine::with_console(&output);
        let actions = vec![audio("missing.mp3"), CueAction::tts("fortsätter")];

        let report = engine.execute_actions(&actions, &CueId::from("4.1")).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.executed, 1);
        assert_eq!(output.spoken(), vec!["fortsätter"]);
    }

    #[tokio::test]
    async fn missing_fields_are_skipped() {
        let (engine, output) = engine();
        let actions = vec![
            CueAction::new(ActionKind::Tts),
            CueAction::new(ActionKind::Audio),
            CueAction::new(ActionKind::Video),
            CueAction::new(ActionKind::Subtitle),
        ];
        let report = engine.execute_actions(&actions, &CueId::from("5.1")).await;
        assert_eq!(report.skipped, 4);
        assert!(output.entries().is_empty());
    }

    #[tokio::test]
    async fn tts_language_and_volume_defaults() {
        let (engine, output) = engine();
        let actions = vec![
            CueAction { language: Some("en-GB".into()), ..CueAction::tts("Hello") },
            audio("bell.mp3"),
        ];
        engine.execute_actions(&actions, &CueId::from("6.1")).await;

        let entries = output.entries();
        assert_eq!(
            entries[0],
            StageOutput::Speech { text: "Hello".into(), language: "en-GB".into() }
        );
        assert_eq!(
            entries[1],
            StageOutput::PlaybackStarted {
                kind: MediaKind::Audio,
                file: "bell.mp3".into(),
                volume: 1.0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cue_triggered_before_stop_is_cancelled_when_it_starts_late() {
        let (engine, output) = engine();
        let token = engine.stop_token();

        engine.stop_all_actions().await;
        let report = engine
            .execute_actions_until(&[CueAction::tts("efter stopp")], &CueId::from("7.1"), &token)
            .await;

        assert!(report.cancelled);
        assert_eq!(report.executed, 0);
        assert!(output.spoken().is_empty());
    }

    /// Speech engine that takes a while to start an utterance.
    #[derive(Default)]
    struct SlowStartSpeech {
        speaking: AtomicBool,
    }

    #[async_trait]
    impl SpeechSynthesizer for SlowStartSpeech {
        async fn is_speaking(&self) -> bool {
            self.speaking.load(Ordering::SeqCst)
        }

        async fn speak(&self, _request: SpeechRequest) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.speaking.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.speaking.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_utterance_start_silences_it() {
        let speech = Arc::new(SlowStartSpeech::default());
        let output = ConsoleOutput::new();
        let engine = Arc::new(ActionEngine::new(
            Arc::clone(&speech) as Arc<dyn SpeechSynthesizer>,
            Arc::new(output.clone()),
            Arc::new(output),
        ));

        let run = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move {
                engine.execute_actions(&[CueAction::tts("hej")], &CueId::from("8.1")).await
            }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.stop_all_actions().await;

        let report = run.await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.executed, 0);
        assert!(!engine.is_speaking().await);
    }

    #[tokio::test]
    async fn handles_stay_bounded_across_many_cues() {
        let (engine, output) = engine();
        for i in 0..50 {
            let file = format!("clip{}.mp3", i % 3);
            engine.execute_actions(&[audio(&file)], &CueId::from(format!("9.{i}"))).await;
        }

        assert_eq!(engine.tracked_handles(), 3);
        let released = output
            .entries()
            .into_iter()
            .filter(|e| matches!(e, StageOutput::PlaybackReleased { .. }))
            .count();
        assert_eq!(released, 47);
    }

    struct EndedPlayback;

    #[async_trait]
    impl PlaybackHandle for EndedPlayback {
        async fn stop(&mut self) -> Result<()> {
            Ok(())
        }

        async fn unload(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_finished(&self) -> bool {
            true
        }
    }

    struct ShortClips;

    #[async_trait]
    impl MediaPlayer for ShortClips {
        async fn play(&self, _request: PlaybackRequest) -> Result<Box<dyn PlaybackHandle>> {
            Ok(Box::new(EndedPlayback))
        }
    }

    #[tokio::test]
    async fn finished_playbacks_are_released_on_next_clip() {
        let output = ConsoleOutput::new();
        let engine = ActionEngine::new(
            Arc::new(output.clone()),
            Arc::new(ShortClips),
            Arc::new(output),
        );

        for file in ["a.mp3", "b.mp3", "c.mp3"] {
            engine.execute_actions(&[audio(file)], &CueId::from("10.1")).await;
        }
        assert_eq!(engine.tracked_handles(), 1);
    }
}
