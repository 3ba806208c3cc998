//! Playlist retrieval.
//!
//! Locators come from deep links and are either `http(s)://` URLs or, for
//! authoring on a desktop, `file://` paths.

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};

/// Source of raw playlist documents.
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    /// Fetch the document body at `locator`.
    async fn fetch(&self, locator: &str) -> Result<String>;
}

/// Fetcher for network and local-file locators.
#[derive(Clone)]
pub struct HttpPlaylistFetcher {
    client: Client,
}

impl HttpPlaylistFetcher {
    /// Create a fetcher from config
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.fetch_timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch_http(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::transport(format!("Request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::transport_status(
                format!("Request to {url} returned {status}"),
                status.as_u16(),
            ));
        }

        resp.text()
            .await
            .map_err(|e| Error::transport(format!("Reading body from {url} failed: {e}")))
    }

    async fn fetch_file(path: PathBuf) -> Result<String> {
        fs_err::tokio::read_to_string(&path)
            .await
            .map_err(|e| Error::transport(format!("Reading {} failed: {e}", path.display())))
    }
}

#[async_trait]
impl PlaylistFetcher for HttpPlaylistFetcher {
    async fn fetch(&self, locator: &str) -> Result<String> {
        tracing::info!(locator, "Fetching playlist");
        match locator.split_once("://") {
            Some(("http" | "https", _)) => self.fetch_http(locator).await,
            Some(("file", path)) => {
                let path = PathBuf::from(shellexpand::tilde(path).to_string());
                Self::fetch_file(path).await
            }
            _ => Err(Error::transport(format!("Unsupported playlist locator: {locator}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one request on a local port with `status` and `body`.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/shows/hamlet.json")
    }

    #[tokio::test]
    async fn http_success_returns_body() {
        let url = serve_once("200 OK", "{\"ok\":true}").await;
        let fetcher = HttpPlaylistFetcher::new(&Config::default());
        assert_eq!(fetcher.fetch(&url).await.unwrap(), "{\"ok\":true}");
    }

    #[tokio::test]
    async fn http_not_found_carries_status_and_hint() {
        let url = serve_once("404 Not Found", "").await;
        let fetcher = HttpPlaylistFetcher::new(&Config::default());

        match fetcher.fetch(&url).await {
            Err(Error::Transport { status: Some(404), hint: Some(hint), .. }) => {
                assert!(hint.contains("check the link"));
            }
            other => panic!("expected a 404 transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_server_error_carries_status() {
        let url = serve_once("503 Service Unavailable", "down").await;
        let fetcher = HttpPlaylistFetcher::new(&Config::default());

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::Transport { status: Some(503), hint: Some(_), .. }));
        assert!(err.is_load_failure());
    }

    #[tokio::test]
    async fn file_locator_reads_local_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("show.json");
        std::fs::write(&path, "{\"ok\":true}").unwrap();

        let fetcher = HttpPlaylistFetcher::new(&Config::default());
        let body = fetcher.fetch(&format!("file://{}", path.display())).await.unwrap();
        assert_eq!(body, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn missing_file_is_transport_error() {
        let fetcher = HttpPlaylistFetcher::new(&Config::default());
        let err = fetcher.fetch("file:///definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, Error::Transport { status: None, .. }));
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let fetcher = HttpPlaylistFetcher::new(&Config::default());
        let err = fetcher.fetch("ftp://example.com/show.json").await.unwrap_err();
        assert!(err.is_load_failure());
    }
}
