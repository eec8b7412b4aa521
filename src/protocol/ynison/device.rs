//! Ephemeral device identity.
//!
//! Every orchestrator call joins the session as a brand-new synthetic device.
//! The identity is announced twice: as the JSON [`Descriptor`] carried in the
//! `Sec-WebSocket-Protocol` header of both handshakes, and as the [`Device`]
//! block of a full-state update.

use std::iter;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::{json::JsonString, serde_as};

/// Client class announced in the descriptor header.
#[derive(Copy, Clone, Debug, Default, Hash, Serialize_repr, Deserialize_repr, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientKind {
    /// Web player.
    #[default]
    Web = 1,
}

/// Device type in device blocks.
#[derive(Copy, Clone, Debug, Default, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    #[default]
    Web,
    Android,
    Ios,
    SmartSpeaker,
    Tv,
    Auto,
    #[serde(other)]
    Unknown,
}

/// What a device is able to do in the session.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub can_be_player: bool,
    pub can_be_remote_controller: bool,
    pub volume_granularity: u32,
}

impl Capabilities {
    /// Volume steps announced by the web player.
    pub const VOLUME_GRANULARITY: u32 = 16;

    /// A player that does not offer remote control.
    #[must_use]
    pub fn player() -> Self {
        Self {
            can_be_player: true,
            can_be_remote_controller: false,
            volume_granularity: Self::VOLUME_GRANULARITY,
        }
    }
}

/// A synthetic device that exists for the duration of one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub app_name: String,
    pub kind: ClientKind,
    pub capabilities: Capabilities,
}

impl DeviceIdentity {
    /// Length of device ids minted by the web player.
    pub const DEFAULT_LENGTH: usize = 16;

    /// Application name announced by the web player.
    pub const DEFAULT_APP_NAME: &'static str = "Chrome";

    /// Mints an identity with a random id of `length` lowercase characters.
    ///
    /// Ids are not checked for uniqueness; a collision with another device
    /// is accepted as noise.
    #[must_use]
    pub fn generate(length: usize) -> Self {
        let device_id = iter::repeat_with(fastrand::lowercase)
            .take(length)
            .collect::<String>();
        trace!("device id: {device_id}");

        Self {
            device_id,
            app_name: Self::DEFAULT_APP_NAME.to_owned(),
            kind: ClientKind::default(),
            capabilities: Capabilities::player(),
        }
    }

    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// The descriptor for the discovery handshake.
    #[must_use]
    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            device_id: self.device_id.clone(),
            info: DescriptorInfo {
                app_name: self.app_name.clone(),
                kind: self.kind,
            },
            redirect_ticket: None,
        }
    }

    /// The descriptor for the state channel handshake.
    #[must_use]
    pub fn descriptor_with_ticket(&self, ticket: &str) -> Descriptor {
        self.descriptor().with_ticket(ticket)
    }

    /// The device block of a full-state update.
    ///
    /// The device joins as a shadow: it observes the session without taking
    /// over playback.
    #[must_use]
    pub fn device(&self, title: &str) -> Device {
        Device {
            capabilities: self.capabilities.clone(),
            info: DeviceInfo {
                device_id: self.device_id.clone(),
                device_type: DeviceType::Web,
                title: title.to_owned(),
                app_name: self.app_name.clone(),
                app_version: String::new(),
            },
            volume_info: VolumeInfo::default(),
            is_shadow: true,
            is_offline: false,
        }
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::generate(Self::DEFAULT_LENGTH)
    }
}

/// Device descriptor sent in the `Sec-WebSocket-Protocol` header.
///
/// `Ynison-Device-Info` is JSON embedded in a string. The `Serialize` and
/// `Deserialize` implementations handle this transparently.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "Ynison-Device-Id")]
    pub device_id: String,

    #[serde(rename = "Ynison-Device-Info")]
    #[serde_as(as = "JsonString")]
    pub info: DescriptorInfo,

    #[serde(
        rename = "Ynison-Redirect-Ticket",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_ticket: Option<String>,
}

impl Descriptor {
    /// Adds the redirect ticket.
    #[must_use]
    pub fn with_ticket(mut self, ticket: impl Into<String>) -> Self {
        self.redirect_ticket = Some(ticket.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorInfo {
    pub app_name: String,
    #[serde(rename = "type")]
    pub kind: ClientKind,
}

/// A device block, as sent in full-state updates and listed in replies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub capabilities: Capabilities,
    pub info: DeviceInfo,
    pub volume_info: VolumeInfo,
    pub is_shadow: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_offline: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub title: String,
    pub app_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub app_version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeInfo {
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_lowercase_of_requested_length() {
        for length in [1, 16, 64] {
            let identity = DeviceIdentity::generate(length);
            assert_eq!(identity.device_id.chars().count(), length);
            assert!(identity.device_id.chars().all(|chr| chr.is_ascii_lowercase()));
        }
    }

    #[test]
    fn default_identity_is_a_web_player() {
        let identity = DeviceIdentity::default();
        assert_eq!(identity.device_id.len(), DeviceIdentity::DEFAULT_LENGTH);
        assert_eq!(identity.app_name, "Chrome");
        assert!(identity.capabilities.can_be_player);
        assert!(!identity.capabilities.can_be_remote_controller);
        assert_eq!(identity.capabilities.volume_granularity, 16);
    }

    #[test]
    fn descriptor_embeds_device_info_as_string() {
        let identity = DeviceIdentity::generate(4);
        let descriptor = serde_json::to_value(identity.descriptor()).unwrap();
        assert_eq!(
            descriptor,
            json!({
                "Ynison-Device-Id": identity.device_id,
                "Ynison-Device-Info": "{\"app_name\":\"Chrome\",\"type\":1}",
            })
        );
    }

    #[test]
    fn descriptor_with_ticket() {
        let descriptor = DeviceIdentity::generate(4).descriptor_with_ticket("T1");
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["Ynison-Redirect-Ticket"], "T1");

        let parsed: Descriptor = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn device_block_is_a_shadow() {
        let identity = DeviceIdentity::generate(8);
        let device = serde_json::to_value(identity.device("Chrome Browser")).unwrap();
        assert_eq!(
            device,
            json!({
                "capabilities": {
                    "can_be_player": true,
                    "can_be_remote_controller": false,
                    "volume_granularity": 16,
                },
                "info": {
                    "device_id": identity.device_id,
                    "type": "WEB",
                    "title": "Chrome Browser",
                    "app_name": "Chrome",
                },
                "volume_info": { "volume": 0.0 },
                "is_shadow": true,
            })
        );
    }

    #[test]
    fn unknown_device_types_are_tolerated() {
        let info: DeviceInfo =
            serde_json::from_value(json!({ "device_id": "x", "type": "FRIDGE" })).unwrap();
        assert_eq!(info.device_type, DeviceType::Unknown);
    }
}
