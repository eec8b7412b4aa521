//! Wire encoding and decoding of state envelopes.
//!
//! The wire format mirrors the backend's protobuf messages in their JSON
//! mapping: 64-bit integers may arrive as decimal strings, absent fields take
//! their zero values, and the selected queue entry is a signed index with
//! `-1` meaning "nothing selected". The `Raw*` types below describe that
//! format exactly; conversion to the domain types in [`state`](super::state)
//! is where the index is checked against the playable list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::{
    command::{Command, FullState},
    device::Device,
    state::{PlaybackStatus, Playable, PlayerQueue, PlayerState, RepeatMode, SessionState},
    version::VersionStamp,
};
use crate::{
    error::{Error, Result},
    protocol,
};

/// Wire index meaning "nothing selected".
///
/// Indices are read as `i128` so that values past `i64` still decode and
/// are rejected as out of range rather than as malformed.
pub const NONE_SELECTED: i128 = -1;

/// Interception policy sent with full-state updates.
pub const DO_NOT_INTERCEPT_BY_DEFAULT: &str = "DO_NOT_INTERCEPT_BY_DEFAULT";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct QueueOptions {
    repeat_mode: RepeatMode,
}

#[serde_as]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawQueue {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    current_playable_index: i128,
    entity_id: String,
    entity_type: String,
    playable_list: Vec<Playable>,
    options: QueueOptions,
    entity_context: String,
    version: VersionStamp,
    from_optional: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawPlayerState {
    player_queue: RawQueue,
    status: PlaybackStatus,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawFullState {
    player_state: RawPlayerState,
    device: Device,
    is_currently_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawPlayerUpdate {
    player_state: RawPlayerState,
}

/// Outgoing envelope, told apart by its top-level key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Full {
        update_full_state: RawFullState,
        rid: String,
        #[serde(default)]
        player_action_timestamp_ms: i64,
        #[serde(default)]
        activity_interception_type: String,
    },
    Player {
        update_player_state: RawPlayerUpdate,
    },
}

/// Reply sent by the backend after every accepted update.
#[serde_as]
#[derive(Debug, Deserialize)]
struct RawSessionState {
    player_state: RawPlayerState,
    #[serde(default)]
    devices: Vec<Device>,
    #[serde(default)]
    active_device_id_optional: Option<String>,
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    timestamp_ms: i64,
    #[serde(default)]
    rid: Option<String>,
}

impl From<&PlayerQueue> for RawQueue {
    fn from(queue: &PlayerQueue) -> Self {
        Self {
            current_playable_index: queue
                .current_index()
                .and_then(|index| i128::try_from(index).ok())
                .unwrap_or(NONE_SELECTED),
            entity_id: queue.entity_id.clone(),
            entity_type: queue.entity_type.clone(),
            playable_list: queue.playable_list().to_vec(),
            options: QueueOptions {
                repeat_mode: queue.repeat_mode,
            },
            entity_context: queue.entity_context.clone(),
            version: queue.version.clone(),
            from_optional: queue.from_optional.clone(),
        }
    }
}

impl TryFrom<RawQueue> for PlayerQueue {
    type Error = Error;

    fn try_from(raw: RawQueue) -> Result<Self> {
        let current_index = match raw.current_playable_index {
            NONE_SELECTED => None,
            index => Some(usize::try_from(index).map_err(|_| {
                Error::index_out_of_range(format!(
                    "index {index} outside playable list of {}",
                    raw.playable_list.len()
                ))
            })?),
        };

        let mut queue = PlayerQueue::new(raw.playable_list, current_index, raw.version)?;
        queue.entity_id = raw.entity_id;
        queue.entity_type = raw.entity_type;
        queue.entity_context = raw.entity_context;
        queue.from_optional = raw.from_optional;
        queue.repeat_mode = raw.options.repeat_mode;
        Ok(queue)
    }
}

impl From<&PlayerState> for RawPlayerState {
    fn from(state: &PlayerState) -> Self {
        Self {
            player_queue: RawQueue::from(&state.queue),
            status: state.status.clone(),
        }
    }
}

impl TryFrom<RawPlayerState> for PlayerState {
    type Error = Error;

    fn try_from(raw: RawPlayerState) -> Result<Self> {
        Ok(Self {
            queue: raw.player_queue.try_into()?,
            status: raw.status,
        })
    }
}

impl From<&Command> for Envelope {
    fn from(command: &Command) -> Self {
        match command {
            Command::FullStateUpdate { state, rid } => Self::Full {
                update_full_state: RawFullState {
                    player_state: RawPlayerState::from(&state.player_state),
                    device: state.device.clone(),
                    is_currently_active: state.is_currently_active,
                },
                rid: rid.clone(),
                player_action_timestamp_ms: 0,
                activity_interception_type: DO_NOT_INTERCEPT_BY_DEFAULT.to_owned(),
            },
            Command::PlayerStateUpdate { state } => Self::Player {
                update_player_state: RawPlayerUpdate {
                    player_state: RawPlayerState::from(state),
                },
            },
        }
    }
}

impl TryFrom<Envelope> for Command {
    type Error = Error;

    fn try_from(envelope: Envelope) -> Result<Self> {
        Ok(match envelope {
            Envelope::Full {
                update_full_state,
                rid,
                ..
            } => Self::FullStateUpdate {
                state: FullState {
                    player_state: update_full_state.player_state.try_into()?,
                    device: update_full_state.device,
                    is_currently_active: update_full_state.is_currently_active,
                },
                rid,
            },
            Envelope::Player {
                update_player_state,
            } => Self::PlayerStateUpdate {
                state: update_player_state.player_state.try_into()?,
            },
        })
    }
}

impl TryFrom<RawSessionState> for SessionState {
    type Error = Error;

    fn try_from(raw: RawSessionState) -> Result<Self> {
        let PlayerState { queue, status } = raw.player_state.try_into()?;
        Ok(Self {
            queue,
            status,
            devices: raw.devices,
            active_device_id: raw.active_device_id_optional.filter(|id| !id.is_empty()),
            timestamp_ms: raw.timestamp_ms,
            rid: raw.rid.filter(|rid| !rid.is_empty()),
        })
    }
}

/// Serializes `command` into a text frame.
///
/// # Errors
///
/// Returns `MalformedPayload` if serialization fails.
pub fn encode(command: &Command) -> Result<String> {
    let text = serde_json::to_string(&Envelope::from(command))?;
    trace!("encoded: {text}");
    Ok(text)
}

/// Parses a text frame produced by [`encode`].
///
/// # Errors
///
/// * `MalformedPayload` - not a command envelope
/// * `IndexOutOfRange` - queue index outside the playable list
pub fn decode_command(raw: &str) -> Result<Command> {
    let envelope: Envelope = protocol::json(raw, "ynison command")?;
    envelope.try_into()
}

/// Parses a session state reply.
///
/// A queue index of `-1` decodes to "nothing selected". Any other index
/// outside the playable list is rejected; indices are never clamped or
/// counted from the end.
///
/// # Errors
///
/// * `MalformedPayload` - not JSON, a backend error object, or no player
///   state
/// * `IndexOutOfRange` - queue index outside the playable list
pub fn decode(raw: &str) -> Result<SessionState> {
    let value: Value = protocol::json(raw, "ynison state")?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), ToOwned::to_owned);
        return Err(Error::malformed_payload(format!("backend error: {message}")));
    }

    let state: RawSessionState = serde_json::from_value(value)?;
    state.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        protocol::ynison::{DeviceIdentity, PlayableType},
    };
    use serde_json::json;

    fn reply(index: Value, list: Value) -> String {
        json!({
            "player_state": {
                "player_queue": {
                    "current_playable_index": index,
                    "entity_id": "album:7",
                    "entity_type": "ALBUM",
                    "playable_list": list,
                    "options": { "repeat_mode": "ONE" },
                    "entity_context": "BASED_ON_ENTITY_BY_DEFAULT",
                    "version": { "device_id": "speaker", "version": "12", "timestamp_ms": "34" },
                },
                "status": {
                    "duration_ms": "215000",
                    "paused": true,
                    "playback_speed": 1,
                    "progress_ms": 1500,
                    "version": { "device_id": "speaker", "version": 13, "timestamp_ms": 35 },
                },
            },
            "devices": [{
                "info": { "device_id": "speaker", "type": "SMART_SPEAKER", "title": "Station" },
                "is_shadow": false,
            }],
            "active_device_id_optional": "speaker",
            "timestamp_ms": "1700000000000",
            "rid": "f4c8b3a2-0000-4000-8000-000000000000",
        })
        .to_string()
    }

    fn two_tracks() -> Value {
        json!([
            { "playable_id": "10", "playable_type": "TRACK" },
            { "playable_id": 20, "playable_type": "TRACK" },
        ])
    }

    #[test]
    fn full_state_envelope() {
        let identity = DeviceIdentity::generate(16);
        let command = Command::full_state(&identity, "Chrome Browser");
        let value: Value = serde_json::from_str(&encode(&command).unwrap()).unwrap();

        assert_eq!(value["rid"], command.rid().unwrap());
        assert_eq!(value["player_action_timestamp_ms"], 0);
        assert_eq!(value["activity_interception_type"], DO_NOT_INTERCEPT_BY_DEFAULT);

        let full = &value["update_full_state"];
        assert_eq!(full["is_currently_active"], false);
        assert_eq!(full["device"]["is_shadow"], true);
        assert_eq!(full["device"]["info"]["type"], "WEB");

        let queue = &full["player_state"]["player_queue"];
        assert_eq!(queue["current_playable_index"], -1);
        assert_eq!(queue["playable_list"], json!([]));
        assert_eq!(queue["entity_type"], "VARIOUS");
        assert_eq!(queue["options"]["repeat_mode"], "NONE");
        assert_eq!(queue["version"]["device_id"], identity.device_id.as_str());

        let status = &full["player_state"]["status"];
        assert_eq!(status["paused"], true);
        assert_eq!(status["progress_ms"], 0);
    }

    #[test]
    fn player_update_envelope() {
        let command = Command::player_update("abc", 42);
        let value: Value = serde_json::from_str(&encode(&command).unwrap()).unwrap();

        assert!(value.get("rid").is_none());
        let queue = &value["update_player_state"]["player_state"]["player_queue"];
        assert_eq!(queue["current_playable_index"], 0);
        assert_eq!(
            queue["playable_list"],
            json!([{ "playable_id": "42", "playable_type": "TRACK" }])
        );
        assert_eq!(queue["options"]["repeat_mode"], "ALL");
        assert_eq!(
            value["update_player_state"]["player_state"]["status"]["paused"],
            false
        );
    }

    #[test]
    fn player_update_round_trip() {
        let command = Command::player_update("abc", 42);
        let decoded = decode_command(&encode(&command).unwrap()).unwrap();
        assert_eq!(decoded, command);

        let state = decoded.player_state();
        assert_eq!(state.queue.playable_list(), &[Playable::track(42)]);
        assert_eq!(state.queue.repeat_mode, RepeatMode::All);
        assert!(!state.status.paused);
    }

    #[test]
    fn full_state_round_trip() {
        let command = Command::full_state(&DeviceIdentity::generate(16), "Chrome Browser");
        let decoded = decode_command(&encode(&command).unwrap()).unwrap();
        assert_eq!(decoded, command);
        assert_eq!(decoded.player_state().queue.current_index(), None);
    }

    #[test]
    fn decodes_a_reply() {
        let state = decode(&reply(json!(1), two_tracks())).unwrap();

        assert_eq!(state.queue.current_index(), Some(1));
        assert_eq!(state.selected().and_then(Playable::track_id), Some(20));
        assert_eq!(state.queue.entity_id, "album:7");
        assert_eq!(state.queue.entity_type, "ALBUM");
        assert_eq!(state.queue.repeat_mode, RepeatMode::One);
        assert_eq!(state.queue.version.version, 12);
        assert_eq!(state.status.duration_ms, 215_000);
        assert_eq!(state.status.progress_ms, 1_500);
        assert!(state.status.paused);
        assert_eq!(state.timestamp_ms, 1_700_000_000_000);
        assert!(state.is_active());
        assert_eq!(
            state.active_device().map(|device| device.info.title.as_str()),
            Some("Station")
        );
    }

    #[test]
    fn sentinel_means_nothing_selected() {
        let state = decode(&reply(json!(-1), two_tracks())).unwrap();
        assert_eq!(state.queue.current_index(), None);
        assert_eq!(state.selected(), None);
        assert_eq!(state.queue.playable_list().len(), 2);
    }

    #[test]
    fn sentinel_on_empty_queue() {
        let state = decode(&reply(json!("-1"), json!([]))).unwrap();
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn indices_outside_the_list_are_rejected() {
        for index in [json!(2), json!(5), json!(-2), json!("-3"), json!(i64::MIN)] {
            let err = decode(&reply(index.clone(), two_tracks())).unwrap_err();
            assert_eq!(err.kind, ErrorKind::IndexOutOfRange, "index {index}");
        }

        let err = decode(&reply(json!(0), json!([]))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn indices_past_i64_are_out_of_range() {
        let raw = reply(json!(0), two_tracks()).replace(
            r#""current_playable_index":0"#,
            r#""current_playable_index":9223372036854775808"#,
        );
        assert!(raw.contains("9223372036854775808"));
        let err = decode(&raw).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfRange);

        for index in [
            json!(u64::MAX),
            json!("9223372036854775808"),
            json!("100000000000000000000000"),
        ] {
            let err = decode(&reply(index.clone(), two_tracks())).unwrap_err();
            assert_eq!(err.kind, ErrorKind::IndexOutOfRange, "index {index}");
        }
    }

    #[test]
    fn string_indices_are_accepted() {
        let state = decode(&reply(json!("0"), two_tracks())).unwrap();
        assert_eq!(state.queue.current_index(), Some(0));
    }

    #[test]
    fn absent_fields_take_defaults() {
        let state = decode(r#"{"player_state": {"player_queue": {"playable_list": [{"playable_id": "5", "playable_type": "VIDEO_CLIP"}]}}}"#)
            .unwrap();
        assert_eq!(state.queue.current_index(), Some(0));
        assert_eq!(
            state.selected().map(|playable| playable.playable_type),
            Some(PlayableType::VideoClip)
        );
        assert!(!state.status.paused);
        assert!(state.devices.is_empty());
        assert!(!state.is_active());
        assert_eq!(state.rid, None);
    }

    #[test]
    fn empty_active_device_is_inactive() {
        let mut value: Value = serde_json::from_str(&reply(json!(-1), json!([]))).unwrap();
        value["active_device_id_optional"] = json!("");
        let state = decode(&value.to_string()).unwrap();
        assert!(!state.is_active());
    }

    #[test]
    fn malformed_replies() {
        for raw in ["", "not json", "[]", r#"{"devices": []}"#, r#"{"player_state": 7}"#] {
            let err = decode(raw).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedPayload, "reply {raw:?}");
        }
    }

    #[test]
    fn backend_errors_are_malformed_payloads() {
        let err = decode(r#"{"error": {"http_code": 401, "message": "Invalid token"}}"#)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedPayload);
        assert!(err.to_string().contains("Invalid token"));
    }
}
