//! Console stage output.
//!
//! Implements every output collaborator by recording what would reach the
//! audience. The show runner renders the log in its stage pane; tests assert
//! on it. Utterances are considered in progress for an estimate of their
//! spoken length so stop-before-speak behaves as on a device.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::engine::output::{
    MediaKind, MediaPlayer, MessageDisplay, MessageKind, PlaybackHandle, PlaybackRequest,
    SpeechRequest, SpeechSynthesizer,
};
use crate::error::{Error, Result};

/// Entries kept before the oldest are dropped.
const LOG_CAPACITY: usize = 500;

/// Approximate speaking time per word at rate 1.0.
const MS_PER_WORD: f32 = 350.0;

/// Something that reached (or left) the stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// Utterance started.
    Speech {
        /// Spoken text.
        text: String,
        /// Locale tag.
        language: String,
    },
    /// Utterance interrupted.
    SpeechStopped,
    /// Media playback started.
    PlaybackStarted {
        /// Audio or video.
        kind: MediaKind,
        /// Media filename.
        file: String,
        /// Gain.
        volume: f64,
    },
    /// Media playback stopped.
    PlaybackStopped {
        /// Media filename.
        file: String,
    },
    /// Media resource released.
    PlaybackReleased {
        /// Media filename.
        file: String,
    },
    /// On-screen message.
    Message {
        /// Text or subtitle.
        kind: MessageKind,
        /// Displayed text.
        text: String,
    },
}

#[derive(Debug, Default)]
struct Shared {
    log: VecDeque<StageOutput>,
    speaking_until: Option<Instant>,
}

impl Shared {
    fn push(&mut self, entry: StageOutput) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(entry);
    }
}

/// Recording implementation of speech, media and message output.
#[derive(Debug, Clone, Default)]
pub struct ConsoleOutput {
    shared: Arc<Mutex<Shared>>,
    media_root: Option<PathBuf>,
}

impl ConsoleOutput {
    /// Output that accepts any media filename.
    pub fn new() -> Self {
        Self::default()
    }

    /// Output that fails playback of files missing from `root`.
    #[must_use]
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(root.into());
        self
    }

    /// Everything recorded so far, oldest first.
    pub fn entries(&self) -> Vec<StageOutput> {
        self.shared.lock().log.iter().cloned().collect()
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<StageOutput> {
        let shared = self.shared.lock();
        let skip = shared.log.len().saturating_sub(n);
        shared.log.iter().skip(skip).cloned().collect()
    }

    /// Texts spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.shared
            .lock()
            .log
            .iter()
            .filter_map(|entry| match entry {
                StageOutput::Speech { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, entry: StageOutput) {
        self.shared.lock().push(entry);
    }
}

#[async_trait]
impl SpeechSynthesizer for ConsoleOutput {
    async fn is_speaking(&self) -> bool {
        self.shared.lock().speaking_until.is_some_and(|until| Instant::now() < until)
    }

    async fn speak(&self, request: SpeechRequest) -> Result<()> {
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let estimate = {
            let words = request.text.split_whitespace().count().max(1) as f32;
            Duration::from_millis((words * MS_PER_WORD / request.rate.max(0.1)) as u64)
        };
        tracing::info!(text = %request.text, language = %request.language, "Speaking");

        let mut shared = self.shared.lock();
        shared.speaking_until = Some(Instant::now() + estimate);
        shared.push(StageOutput::Speech { text: request.text, language: request.language });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.speaking_until.take().is_some_and(|until| Instant::now() < until) {
            shared.push(StageOutput::SpeechStopped);
        }
        Ok(())
    }
}

/// Handle for a console playback.
#[derive(Debug)]
pub struct ConsolePlayback {
    file: String,
    shared: Arc<Mutex<Shared>>,
    stopped: bool,
    released: bool,
}

#[async_trait]
impl PlaybackHandle for ConsolePlayback {
    async fn stop(&mut self) -> Result<()> {
        if !self.stopped {
            self.stopped = true;
            self.shared.lock().push(StageOutput::PlaybackStopped { file: self.file.clone() });
        }
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            self.shared.lock().push(StageOutput::PlaybackReleased { file: self.file.clone() });
        }
        Ok(())
    }
    fn is_finished(&self) -> bool {
        self.stopped
    }
}

#[async_trait]
impl MediaPlayer for ConsoleOutput {
    async fn play(&self, request: PlaybackRequest) -> Result<Box<dyn PlaybackHandle>> {
        if let Some(root) = &self.media_root {
            let path = root.join(&request.file);
            if tokio::fs::metadata(&path).await.is_err() {
                return Err(Error::action(
                    request.kind.to_string(),
                    format!("media file not found: {}", path.display()),
                ));
            }
        }
        tracing::info!(
            kind = %request.kind,
            file = %request.file,
            volume = request.volume,
            "Playing"
        );

        self.record(StageOutput::PlaybackStarted {
            kind: request.kind,
            file: request.file.clone(),
            volume: request.volume,
        });
        Ok(Box::new(ConsolePlayback {
            file: request.file,
            shared: Arc::clone(&self.shared),
            stopped: false,
            released: false,
        }))
    }
}

impl MessageDisplay for ConsoleOutput {
    fn show(&self, kind: MessageKind, text: &str) -> Result<()> {
        tracing::info!(?kind, text, "Showing message");
        self.record(StageOutput::Message { kind, text: text.to_string() });
        Ok(())
    }
}
