//! Beacon advertisement decoding.
//!
//! Frame layout (manufacturer data):
//!
//! | bytes  | field                                  |
//! |--------|----------------------------------------|
//! | 0..4   | company id + beacon type, ignored      |
//! | 4..20  | proximity UUID                         |
//! | 20..22 | `major`, big-endian `u16` (scene)      |
//! | 22..24 | `minor`, big-endian `u16` (cue)        |

use std::borrow::Cow;
use uuid::Uuid;

use crate::constants::beacon::{MIN_FRAME_LEN, PREFIX_LEN, UUID_LEN};
use crate::error::{DecodeError, Error, Result};
use crate::types::CueId;

/// Manufacturer data as delivered by the platform scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManufacturerData {
    /// Raw bytes.
    Raw(Vec<u8>),
    /// Hex text, optionally `0x`-prefixed, whitespace ignored.
    Hex(String),
    /// Base64 text.
    Base64(String),
}

impl ManufacturerData {
    /// Decode the transport encoding to raw bytes.
    pub fn to_bytes(&self) -> std::result::Result<Cow<'_, [u8]>, DecodeError> {
        match self {
            Self::Raw(bytes) => Ok(Cow::Borrowed(bytes)),
            Self::Hex(text) => hex_to_bytes(text).map(Cow::Owned),
            Self::Base64(text) => base64::decode(text.trim())
                .map(Cow::Owned)
                .map_err(|e| DecodeError::InvalidBase64(e.to_string())),
        }
    }
}

/// Decoded beacon frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconFrame {
    /// Proximity UUID.
    pub uuid: Uuid,
    /// Scene number.
    pub major: u16,
    /// Cue number within the scene.
    pub minor: u16,
}

impl BeaconFrame {
    /// Parse a frame from manufacturer data bytes.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(DecodeError::TooShort { len: bytes.len() });
        }
        let uuid_end = PREFIX_LEN + UUID_LEN;
        let uuid = Uuid::from_slice(&bytes[PREFIX_LEN..uuid_end])
            .map_err(|_| DecodeError::TooShort { len: bytes.len() })?;
        let major = u16::from_be_bytes([bytes[uuid_end], bytes[uuid_end + 1]]);
        let minor = u16::from_be_bytes([bytes[uuid_end + 2], bytes[uuid_end + 3]]);
        Ok(Self { uuid, major, minor })
    }

    /// Cue id carried by this frame.
    pub fn cue_id(&self) -> CueId {
        CueId::from_beacon(self.major, self.minor)
    }
}

/// Filters advertisements by proximity UUID and yields cue ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconDecoder {
    target: Uuid,
}

impl BeaconDecoder {
    /// Decoder for the given target UUID (hyphenated or plain hex, any case).
    pub fn new(target_uuid: &str) -> Result<Self> {
        Uuid::parse_str(target_uuid.trim())
            .map(|target| Self { target })
            .map_err(|e| Error::schema("bleUUID", format!("'{target_uuid}' is not a UUID: {e}")))
    }

    /// Target UUID.
    pub const fn target(&self) -> Uuid {
        self.target
    }

    /// Decode one advertisement.
    ///
    /// Frames for other UUIDs yield `Ok(None)`; only malformed payloads are
    /// errors.
    pub fn decode(
        &self,
        data: &ManufacturerData,
    ) -> std::result::Result<Option<CueId>, DecodeError> {
        let bytes = data.to_bytes()?;
        let frame = BeaconFrame::parse(&bytes)?;
        Ok((frame.uuid == self.target).then(|| frame.cue_id()))
    }
}

fn hex_to_bytes(text: &str) -> std::result::Result<Vec<u8>, DecodeError> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if digits.len() % 2 != 0 {
        return Err(DecodeError::InvalidHex(format!("odd number of digits ({})", digits.len())));
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex(format!("unexpected character '{bad}'")));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| DecodeError::InvalidHex(e.to_string()))
        })
        .collect()
}
