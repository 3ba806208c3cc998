//! Beacon scan loop.
//!
//! The radio itself is a platform collaborator behind [`AdvertisementScanner`].
//! [`BeaconListener`] owns the scan task: enabling starts the scanner and a
//! decode loop that forwards cue ids, disabling aborts the loop and stops the
//! scanner before returning.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::beacon::decoder::{BeaconDecoder, ManufacturerData};
use crate::constants::async_tasks::CHANNEL_BUFFER_SIZE;
use crate::constants::beacon::REPEAT_WINDOW_MS;
use crate::error::{Error, Result};
use crate::types::CueId;

/// One observed advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Platform device identifier, if reported.
    pub device_id: Option<String>,
    /// Manufacturer data payload.
    pub data: ManufacturerData,
}

impl Advertisement {
    /// Advertisement with no device id.
    pub const fn new(data: ManufacturerData) -> Self {
        Self { device_id: None, data }
    }
}

/// Platform radio scanner.
#[async_trait]
pub trait AdvertisementScanner: Send + Sync {
    /// Start scanning; advertisements arrive on the returned channel.
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>>;
    /// Stop scanning and release the radio.
    async fn stop_scan(&self) -> Result<()>;
}

/// Scanner fed by the embedding platform layer (or tests) through [`ChannelScanner::inject`].
#[derive(Debug, Default)]
pub struct ChannelScanner {
    active: Mutex<Option<mpsc::Sender<Advertisement>>>,
}

impl ChannelScanner {
    /// Create an idle scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Deliver an advertisement to the running scan. Returns `false` when idle.
    pub async fn inject(&self, advertisement: Advertisement) -> bool {
        let sender = self.active.lock().clone();
        match sender {
            Some(tx) => tx.send(advertisement).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl AdvertisementScanner for ChannelScanner {
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        *self.active.lock() = Some(tx);
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<()> {
        self.active.lock().take();
        Ok(())
    }
}

/// Replays captured traffic: one base64 advertisement per line, `#` comments.
#[derive(Debug)]
pub struct ReplayScanner {
    path: PathBuf,
    gap: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayScanner {
    /// Replay `path`, pausing `gap` between advertisements.
    pub fn new(path: impl Into<PathBuf>, gap: Duration) -> Self {
        Self { path: path.into(), gap, task: Mutex::new(None) }
    }
}

#[async_trait]
impl AdvertisementScanner for ReplayScanner {
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>> {
        let capture = fs_err::tokio::read_to_string(&self.path)
            .await
            .map_err(|e| Error::io(e, self.path.clone()))?;
        let lines: Vec<String> = capture
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let gap = self.gap;
        let handle = tokio::spawn(async move {
            for line in lines {
                if tx.send(Advertisement::new(ManufacturerData::Base64(line))).await.is_err() {
                    break;
                }
                tokio::time::sleep(gap).await;
            }
        });
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<()> {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        Ok(())
    }
}

/// Enables and disables the beacon scan loop.
pub struct BeaconListener {
    scanner: Arc<dyn AdvertisementScanner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BeaconListener {
    /// Listener over the given scanner.
    pub fn new(scanner: Arc<dyn AdvertisementScanner>) -> Self {
        Self { scanner, task: Mutex::new(None) }
    }

    /// Whether the scan loop is running.
    pub fn is_enabled(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start listening for `target_uuid`; matching cue ids arrive on the
    /// returned channel. Re-enabling replaces the previous scan.
    pub async fn enable(&self, target_uuid: &str) -> Result<mpsc::Receiver<CueId>> {
        let decoder = BeaconDecoder::new(target_uuid)?;
        self.disable().await;

        let advertisements = self.scanner.start_scan().await?;
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let handle = tokio::spawn(scan_loop(decoder, advertisements, tx));
        *self.task.lock() = Some(handle);

        tracing::info!(target_uuid = %decoder.target(), "Beacon listening enabled");
        Ok(rx)
    }

    /// Stop the scan loop and the scanner. Safe when already disabled.
    pub async fn disable(&self) {
        let handle = self.task.lock().take();
        let Some(handle) = handle else {
            return;
        };
        handle.abort();
        let _ = handle.await;
        if let Err(e) = self.scanner.stop_scan().await {
            tracing::warn!(error = %e, "Failed to stop beacon scanner");
        }
        tracing::info!("Beacon listening disabled");
    }
}

async fn scan_loop(
    decoder: BeaconDecoder,
    mut advertisements: mpsc::Receiver<Advertisement>,
    cues: mpsc::Sender<CueId>,
) {
    // Beacons repeat the same frame many times a second. A repeat only
    // counts as a new trigger once the id has been silent for the window.
    let window = Duration::from_millis(REPEAT_WINDOW_MS);
    let mut last: Option<(CueId, Instant)> = None;

    while let Some(advertisement) = advertisements.recv().await {
        let device = advertisement.device_id.as_deref();
        let cue_id = match decoder.decode(&advertisement.data) {
            Ok(Some(cue_id)) => cue_id,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, ?device, "Ignoring malformed advertisement");
                continue;
            }
        };

        let now = Instant::now();
        let repeat = matches!(
            &last,
            Some((id, seen)) if *id == cue_id && now.duration_since(*seen) < window
        );
        last = Some((cue_id.clone(), now));
        if repeat {
            continue;
        }

        tracing::debug!(%cue_id, ?device, "Beacon cue received");
        if cues.send(cue_id).await.is_err() {
            break;
        }
    }
    tracing::debug!("Beacon scan loop ended");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use uuid::Uuid;

    const SHOW_UUID: &str = "e2c56db5-dffb-48d2-b060-d0f5a71096e0";

    fn frame(uuid: &str, major: u16, minor: u16) -> Advertisement {
        let mut bytes = vec![0x4c, 0x00, 0x02, 0x15];
        bytes.extend_from_slice(Uuid::parse_str(uuid).unwrap().as_bytes());
        bytes.extend_from_slice(&major.to_be_bytes());
        bytes.extend_from_slice(&minor.to_be_bytes());
        Advertisement::new(ManufacturerData::Raw(bytes))
    }

    #[tokio::test]
    async fn corrupt_advertisement_does_not_stop_delivery() {
        let scanner = Arc::new(ChannelScanner::new());
        let listener = BeaconListener::new(Arc::clone(&scanner) as Arc<dyn AdvertisementScanner>);
        let mut cues = listener.enable(SHOW_UUID).await.unwrap();

        assert!(scanner.inject(frame(SHOW_UUID, 1, 1)).await);
        assert!(scanner.inject(Advertisement::new(ManufacturerData::Hex("zz".into()))).await);
        assert!(scanner.inject(Advertisement::new(ManufacturerData::Raw(vec![1, 2]))).await);
        assert!(scanner.inject(frame("f7826da6-4fa2-4e98-8024-bc5b71e0893e", 9, 9)).await);
        assert!(scanner.inject(frame(SHOW_UUID, 1, 2)).await);

        assert_eq!(cues.recv().await.unwrap(), CueId::from("1.1"));
        assert_eq!(cues.recv().await.unwrap(), CueId::from("1.2"));
        listener.disable().await;
    }

    #[tokio::test]
    async fn repeated_frames_fire_once() {
        let scanner = Arc::new(ChannelScanner::new());
        let listener = BeaconListener::new(Arc::clone(&scanner) as Arc<dyn AdvertisementScanner>);
        let mut cues = listener.enable(SHOW_UUID).await.unwrap();

        for _ in 0..5 {
            scanner.inject(frame(SHOW_UUID, 2, 1)).await;
        }
        scanner.inject(frame(SHOW_UUID, 2, 2)).await;
        scanner.inject(frame(SHOW_UUID, 2, 1)).await;

        assert_eq!(cues.recv().await.unwrap(), CueId::from("2.1"));
        assert_eq!(cues.recv().await.unwrap(), CueId::from("2.2"));
        assert_eq!(cues.recv().await.unwrap(), CueId::from("2.1"));
        listener.disable().await;
    }

    #[tokio::test(start_paused = true)]
    async fn same_cue_fires_again_after_silence() {
        let scanner = Arc::new(ChannelScanner::new());
        let listener = BeaconListener::new(Arc::clone(&scanner) as Arc<dyn AdvertisementScanner>);
        let mut cues = listener.enable(SHOW_UUID).await.unwrap();

        scanner.inject(frame(SHOW_UUID, 4, 1)).await;
        assert_eq!(cues.recv().await.unwrap(), CueId::from("4.1"));

        // Continuous broadcast stays one trigger.
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(500)).await;
            scanner.inject(frame(SHOW_UUID, 4, 1)).await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cues.try_recv().is_err());

        // The operator repeats the cue after the beacon went quiet.
        tokio::time::sleep(Duration::from_millis(REPEAT_WINDOW_MS)).await;
        scanner.inject(frame(SHOW_UUID, 4, 1)).await;
        assert_eq!(cues.recv().await.unwrap(), CueId::from("4.1"));
        listener.disable().await;
    }

    #[tokio::test]
    async fn disable_releases_scanner() {
        let scanner = Arc::new(ChannelScanner::new());
        let listener = BeaconListener::new(Arc::clone(&scanner) as Arc<dyn AdvertisementScanner>);
        let mut cues = listener.enable(SHOW_UUID).await.unwrap();
        assert!(listener.is_enabled());
        assert!(scanner.is_scanning());

        listener.disable().await;
        assert!(!listener.is_enabled());
        assert!(!scanner.is_scanning());
        assert!(!scanner.inject(frame(SHOW_UUID, 1, 1)).await);
        assert!(cues.recv().await.is_none());

        listener.disable().await;
    }

    #[tokio::test]
    async fn invalid_target_does_not_start_scan() {
        let scanner = Arc::new(ChannelScanner::new());
        let listener = BeaconListener::new(Arc::clone(&scanner) as Arc<dyn AdvertisementScanner>);
        assert!(listener.enable("venue-beacon").await.is_err());
        assert!(!scanner.is_scanning());
    }

    #[tokio::test(start_paused = true)]
    async fn replay_scanner_feeds_listener() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.txt");
        let ManufacturerData::Raw(bytes) = frame(SHOW_UUID, 3, 4).data else {
            unreachable!()
        };
        let capture = format!("# captured in rehearsal\n{}\n", base64::encode(bytes));
        std::fs::write(&path, capture).unwrap();

        let listener =
            BeaconListener::new(Arc::new(ReplayScanner::new(&path, Duration::from_millis(50))));
        let mut cues = listener.enable(SHOW_UUID).await.unwrap();
        assert_eq!(cues.recv().await.unwrap(), CueId::from("3.4"));
        listener.disable().await;
    }
}
