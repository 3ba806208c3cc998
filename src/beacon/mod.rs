//! Proximity beacon cue delivery.
//!
//! In-venue hardware advertises the show's beacon UUID with the cue number
//! packed into the `major`/`minor` fields. The decoder turns one advertisement
//! into an optional cue id; the listener runs the scan loop.

/// Advertisement payload decoding
pub mod decoder;
/// Scan loop and scanner boundary
pub mod listener;

pub use decoder::{BeaconDecoder, BeaconFrame, ManufacturerData};
pub use listener::{
    Advertisement, AdvertisementScanner, BeaconListener, ChannelScanner, ReplayScanner,
};
