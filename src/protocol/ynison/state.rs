//! Queue, playback status and session state.
//!
//! The selected queue entry is an explicit [`Option`]. On the wire "nothing
//! selected" is the sentinel `-1`; translating between the two, and rejecting
//! every other index outside the playable list, is done by
//! [`codec`](super::codec) and [`PlayerQueue::new`]. A `PlayerQueue` that
//! exists is always consistent.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{device::Device, version::VersionStamp};
use crate::{
    error::{Error, Result},
    protocol,
};

/// Repeat mode of the queue.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

/// Kind of queue entry.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayableType {
    #[default]
    Track,
    LocalTrack,
    Infinite,
    VideoClip,
    #[serde(other)]
    Unknown,
}

/// One entry of the playable list.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playable {
    /// Emitted as a string, accepted as string or number.
    #[serde(deserialize_with = "protocol::string_or_number")]
    pub playable_id: String,

    #[serde(default)]
    pub playable_type: PlayableType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
}

impl Playable {
    #[must_use]
    pub fn track(track_id: u64) -> Self {
        Self {
            playable_id: track_id.to_string(),
            playable_type: PlayableType::Track,
            ..Self::default()
        }
    }

    /// The numeric catalog id, if this is a catalog track.
    #[must_use]
    pub fn track_id(&self) -> Option<u64> {
        match self.playable_type {
            PlayableType::Track => self.playable_id.parse().ok(),
            _ => None,
        }
    }
}

/// The playback queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerQueue {
    current_index: Option<usize>,
    playable_list: Vec<Playable>,
    pub entity_id: String,
    pub entity_type: String,
    pub entity_context: String,
    pub from_optional: String,
    pub repeat_mode: RepeatMode,
    pub version: VersionStamp,
}

impl PlayerQueue {
    /// Entity type of an ad-hoc queue not tied to an album or playlist.
    pub const VARIOUS: &'static str = "VARIOUS";

    /// Default entity context of the web player.
    pub const BASED_ON_ENTITY_BY_DEFAULT: &'static str = "BASED_ON_ENTITY_BY_DEFAULT";

    /// Creates an ad-hoc queue.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `current_index` is outside
    /// `playable_list`.
    pub fn new(
        playable_list: Vec<Playable>,
        current_index: Option<usize>,
        version: VersionStamp,
    ) -> Result<Self> {
        if let Some(index) = current_index {
            if index >= playable_list.len() {
                return Err(Error::index_out_of_range(format!(
                    "index {index} outside playable list of {}",
                    playable_list.len()
                )));
            }
        }

        Ok(Self {
            current_index,
            playable_list,
            entity_id: String::new(),
            entity_type: Self::VARIOUS.to_owned(),
            entity_context: Self::BASED_ON_ENTITY_BY_DEFAULT.to_owned(),
            from_optional: String::new(),
            repeat_mode: RepeatMode::default(),
            version,
        })
    }

    /// An ad-hoc queue with nothing in it.
    #[must_use]
    pub fn empty(version: VersionStamp) -> Self {
        Self {
            current_index: None,
            playable_list: Vec::new(),
            entity_id: String::new(),
            entity_type: Self::VARIOUS.to_owned(),
            entity_context: Self::BASED_ON_ENTITY_BY_DEFAULT.to_owned(),
            from_optional: String::new(),
            repeat_mode: RepeatMode::default(),
            version,
        }
    }

    /// An ad-hoc queue holding and selecting exactly `playable`.
    #[must_use]
    pub fn single(playable: Playable, version: VersionStamp) -> Self {
        Self {
            current_index: Some(0),
            playable_list: vec![playable],
            ..Self::empty(version)
        }
    }

    #[must_use]
    pub fn with_repeat_mode(mut self, repeat_mode: RepeatMode) -> Self {
        self.repeat_mode = repeat_mode;
        self
    }

    /// Index of the selected entry, `None` if nothing is selected.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// The selected entry, `None` if nothing is selected.
    #[must_use]
    pub fn current(&self) -> Option<&Playable> {
        self.current_index
            .and_then(|index| self.playable_list.get(index))
    }

    #[must_use]
    pub fn playable_list(&self) -> &[Playable] {
        &self.playable_list
    }
}

/// Playback status.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackStatus {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub duration_ms: u64,

    pub paused: bool,

    pub playback_speed: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub progress_ms: u64,

    pub version: VersionStamp,
}

impl PlaybackStatus {
    /// Status at the start of a track: zero progress, normal speed.
    #[must_use]
    pub fn at_start(paused: bool, version: VersionStamp) -> Self {
        Self {
            duration_ms: 0,
            paused,
            playback_speed: 1.0,
            progress_ms: 0,
            version,
        }
    }
}

/// Queue and status together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerState {
    pub queue: PlayerQueue,
    pub status: PlaybackStatus,
}

/// The session state as decoded from a state channel reply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub queue: PlayerQueue,
    pub status: PlaybackStatus,
    pub devices: Vec<Device>,
    pub active_device_id: Option<String>,
    pub timestamp_ms: i64,
    pub rid: Option<String>,
}

impl SessionState {
    /// Whether some device is currently playing for the session.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_device_id.is_some()
    }

    /// The device currently playing, if it is listed.
    #[must_use]
    pub fn active_device(&self) -> Option<&Device> {
        let active = self.active_device_id.as_deref()?;
        self.devices
            .iter()
            .find(|device| device.info.device_id == active)
    }

    /// The selected queue entry, `None` if nothing is selected.
    #[must_use]
    pub fn selected(&self) -> Option<&Playable> {
        self.queue.current()
    }
}
