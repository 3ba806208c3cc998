//! Authoring tool for playlists and beacon payloads.
//!
//! Usage:
//!   `cargo run --bin playlist_tool -- sign <playlist.json> [--out <signed.json>]`
//!   `cargo run --bin playlist_tool -- verify <playlist.json>`
//!   `cargo run --bin playlist_tool -- decode [--hex|--base64] <payload> <beacon-uuid>`
//!
//! `sign` stamps the checksum the runner verifies, `verify` reports whether a
//! playlist would be accepted, and `decode` shows the cue id a captured
//! advertisement carries.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use theater_cue::beacon::{BeaconDecoder, BeaconFrame, ManufacturerData};
use theater_cue::playlist::integrity;
use theater_cue::playlist::validate::parse_playlist;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} sign <playlist.json> [--out <signed.json>]");
    eprintln!("       {program} verify <playlist.json>");
    eprintln!("       {program} decode [--hex|--base64] <payload> <beacon-uuid>");
    std::process::exit(2);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("playlist_tool", String::as_str);

    match args.get(1).map(String::as_str) {
        Some("sign") => {
            let Some(input) = args.get(2) else { usage(program) };
            let out = args
                .iter()
                .position(|a| a == "--out")
                .and_then(|i| args.get(i + 1))
                .map_or_else(|| PathBuf::from(input), PathBuf::from);
            sign(Path::new(input), &out)
        }
        Some("verify") => {
            let Some(input) = args.get(2) else { usage(program) };
            verify(Path::new(input))
        }
        Some("decode") => {
            let encoding = match args.get(2).map(String::as_str) {
                Some("--hex") => Some(Encoding::Hex),
                Some("--base64") => Some(Encoding::Base64),
                _ => None,
            };
            let start = if encoding.is_some() { 3 } else { 2 };
            let Some([payload, uuid]) = args.get(start..) else { usage(program) };
            decode(payload, uuid, encoding)
        }
        _ => usage(program),
    }
}

fn sign(input: &Path, out: &Path) -> Result<()> {
    let body = fs_err::read_to_string(input)?;
    let mut playlist = parse_playlist(&body)
        .with_context(|| format!("{} is not a valid playlist", input.display()))?;
    integrity::sign(&mut playlist);

    let json = serde_json::to_string_pretty(&playlist).context("Failed to serialize playlist")?;
    fs_err::write(out, json + "\n")?;
    println!("{} signed: {}", playlist.playlist_id, playlist.checksum);
    Ok(())
}

fn verify(input: &Path) -> Result<()> {
    let body = fs_err::read_to_string(input)?;
    let playlist = parse_playlist(&body)
        .with_context(|| format!("{} is not a valid playlist", input.display()))?;

    if !integrity::verify(&playlist) {
        bail!(
            "{}: integrity check failed (expected {})",
            playlist.playlist_id,
            integrity::compute_checksum(&playlist)
        );
    }
    println!(
        "{}: ok ({} cues, {} scenes)",
        playlist.playlist_id,
        playlist.cues.len(),
        playlist.scenes().len()
    );
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Hex,
    Base64,
}

impl Encoding {
    fn wrap(self, payload: &str) -> ManufacturerData {
        match self {
            Self::Hex => ManufacturerData::Hex(payload.to_string()),
            Self::Base64 => ManufacturerData::Base64(payload.to_string()),
        }
    }
}

/// Decode `payload` as a beacon frame. Without an explicit encoding, hex is
/// tried first and base64 second, since base64 text can consist of hex digits
/// only.
fn parse_payload(
    payload: &str,
    encoding: Option<Encoding>,
) -> Result<(ManufacturerData, BeaconFrame)> {
    let candidates = match encoding {
        Some(encoding) => vec![encoding],
        None => vec![Encoding::Hex, Encoding::Base64],
    };

    let mut last_error = None;
    for encoding in candidates {
        let data = encoding.wrap(payload);
        match data.to_bytes().and_then(|bytes| BeaconFrame::parse(&bytes)) {
            Ok(frame) => return Ok((data, frame)),
            Err(e) => last_error = Some(anyhow::anyhow!("as {encoding:?}: {e}")),
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("empty payload")))
        .context("Payload is not a beacon frame")
}

fn decode(payload: &str, uuid: &str, encoding: Option<Encoding>) -> Result<()> {
    let (data, frame) = parse_payload(payload, encoding)?;
    println!("uuid:  {}", frame.uuid);
    println!("major: {}", frame.major);
    println!("minor: {}", frame.minor);

    match BeaconDecoder::new(uuid)?.decode(&data)? {
        Some(cue_id) => println!("cue:   {cue_id}"),
        None => println!("cue:   (different beacon, ignored)"),
    }
    Ok(())
}
