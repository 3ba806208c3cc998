//! Playlist load/save service.
//!
//! This module owns the boundary between playlist sources, the integrity
//! verifier and the key/value store. A playlist only reaches the store after
//! it has been parsed, structurally validated and verified.

use chrono::Utc;
use std::sync::Arc;

use crate::constants::store::{METADATA_KEY, PLAYLIST_KEY_PREFIX};
use crate::error::{Error, Result};
use crate::playlist::fetch::PlaylistFetcher;
use crate::playlist::integrity::{self, IntegrityMode};
use crate::playlist::model::{Playlist, PlaylistMetadata};
use crate::playlist::store::KeyValueStore;
use crate::playlist::validate::parse_playlist;
use crate::types::PlaylistId;

/// Loads playlists from sources and persists verified ones.
#[derive(Clone)]
pub struct PlaylistService {
    fetcher: Arc<dyn PlaylistFetcher>,
    store: Arc<dyn KeyValueStore>,
    integrity: IntegrityMode,
}

impl PlaylistService {
    /// Create a service over the given fetcher and store.
    pub fn new(
        fetcher: Arc<dyn PlaylistFetcher>,
        store: Arc<dyn KeyValueStore>,
        integrity: IntegrityMode,
    ) -> Self {
        Self { fetcher, store, integrity }
    }

    /// Fetch, parse, validate, verify and persist the playlist at `locator`.
    ///
    /// Any failure before persistence leaves the store untouched.
    pub async fn load_from_source(&self, locator: &str) -> Result<Playlist> {
        let body = self.fetcher.fetch(locator).await?;
        let playlist = parse_playlist(&body)?;
        integrity::check(&playlist, self.integrity)?;

        self.save_playlist(&playlist).await?;
        tracing::info!(
            playlist_id = %playlist.playlist_id,
            show = %playlist.show_name,
            cues = playlist.cues.len(),
            "Playlist loaded"
        );
        Ok(playlist)
    }

    /// Persist `playlist`, replacing any stored one with the same id, and
    /// move its metadata entry to the front of the index.
    pub async fn save_playlist(&self, playlist: &Playlist) -> Result<()> {
        let key = playlist_key(&playlist.playlist_id);
        let json = serde_json::to_string(playlist).map_err(|e| Error::store(&key, e.to_string()))?;
        self.store.set(&key, &json).await?;

        let mut index = self.list_playlists().await?;
        index.retain(|entry| entry.playlist_id != playlist.playlist_id);
        index.insert(0, playlist.metadata(Utc::now()));
        self.write_index(&index).await
    }

    /// Stored playlist by id.
    pub async fn get_playlist(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        let key = playlist_key(id);
        let Some(json) = self.store.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| Error::store(key, format!("stored playlist is unreadable: {e}")))
    }

    /// Metadata of stored playlists, most recently loaded first.
    pub async fn list_playlists(&self) -> Result<Vec<PlaylistMetadata>> {
        match self.store.get(METADATA_KEY).await? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| Error::store(METADATA_KEY, format!("index is unreadable: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    /// Remove a playlist and its metadata entry. Removing an unknown id is a no-op.
    pub async fn delete_playlist(&self, id: &PlaylistId) -> Result<()> {
        self.store.remove(&playlist_key(id)).await?;

        let mut index = self.list_playlists().await?;
        let before = index.len();
        index.retain(|entry| &entry.playlist_id != id);
        if index.len() != before {
            self.write_index(&index).await?;
        }
        tracing::info!(playlist_id = %id, "Playlist deleted");
        Ok(())
    }

    async fn write_index(&self, index: &[PlaylistMetadata]) -> Result<()> {
        let json =
            serde_json::to_string(index).map_err(|e| Error::store(METADATA_KEY, e.to_string()))?;
        self.store.set(METADATA_KEY, &json).await
    }
}

fn playlist_key(id: &PlaylistId) -> String {
    format!("{PLAYLIST_KEY_PREFIX}{id}")
}
