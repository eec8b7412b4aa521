//! Outgoing commands.
//!
//! Two shapes exist: a full-state update, which announces a device and its
//! complete player state, and a player-state update, which replaces only the
//! queue and status. Querying the session is done by sending a full-state
//! update as a shadow device and reading the reply.

use uuid::Uuid;

use super::{
    device::{Device, DeviceIdentity},
    state::{PlaybackStatus, Playable, PlayerQueue, PlayerState, RepeatMode},
    version::VersionStamp,
};

/// A full-state payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FullState {
    pub player_state: PlayerState,
    pub device: Device,
    pub is_currently_active: bool,
}

/// A command to send over the state channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the complete state of the sending device. `rid` correlates
    /// the request with the reply.
    FullStateUpdate { state: FullState, rid: String },

    /// Replaces the queue and status of the session.
    PlayerStateUpdate { state: PlayerState },
}

impl Command {
    /// A query that joins `identity` as an idle shadow device.
    ///
    /// The queue is empty with nothing selected and playback is paused at
    /// the start.
    #[must_use]
    pub fn full_state(identity: &DeviceIdentity, title: &str) -> Self {
        let device_id = identity.device_id.as_str();
        let player_state = PlayerState {
            queue: PlayerQueue::empty(VersionStamp::next(device_id)),
            status: PlaybackStatus::at_start(true, VersionStamp::next(device_id)),
        };

        Self::FullStateUpdate {
            state: FullState {
                player_state,
                device: identity.device(title),
                is_currently_active: false,
            },
            rid: Uuid::new_v4().to_string(),
        }
    }

    /// Starts playing `track_id` on repeat, replacing the current queue.
    #[must_use]
    pub fn player_update(device_id: &str, track_id: u64) -> Self {
        let queue = PlayerQueue::single(Playable::track(track_id), VersionStamp::next(device_id))
            .with_repeat_mode(RepeatMode::All);

        Self::PlayerStateUpdate {
            state: PlayerState {
                queue,
                status: PlaybackStatus::at_start(false, VersionStamp::next(device_id)),
            },
        }
    }

    #[must_use]
    pub fn player_state(&self) -> &PlayerState {
        match self {
            Self::FullStateUpdate { state, .. } => &state.player_state,
            Self::PlayerStateUpdate { state } => state,
        }
    }

    #[must_use]
    pub fn rid(&self) -> Option<&str> {
        match self {
            Self::FullStateUpdate { rid, .. } => Some(rid),
            Self::PlayerStateUpdate { .. } => None,
        }
    }
}
