//! Ynison session protocol types.
//!
//! Ynison synchronizes playback state between the devices of one account.
//! A client joins as a synthetic device, sends one JSON envelope per update,
//! and receives the authoritative session state back.
//!
//! * [`device`] - ephemeral device identity and the descriptor header
//! * [`version`] - version stamps attached to queue and status updates
//! * [`state`] - queue, status and session state
//! * [`command`] - the two command shapes and their builders
//! * [`codec`] - wire encoding and defensive decoding
//! * [`redirect`] - the discovery reply

pub mod codec;
pub mod command;
pub mod device;
pub mod redirect;
pub mod state;
pub mod version;

pub use command::Command;
pub use device::{Capabilities, Descriptor, Device, DeviceIdentity, DeviceType};
pub use redirect::RedirectTicket;
pub use state::{
    PlaybackStatus, Playable, PlayableType, PlayerQueue, PlayerState, RepeatMode, SessionState,
};
pub use version::VersionStamp;
